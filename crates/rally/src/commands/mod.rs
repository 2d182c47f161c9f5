//! CLI command implementations.

pub(crate) mod common;
pub(crate) mod render;
pub(crate) mod watch;

pub(crate) use render::RenderArgs;
pub(crate) use watch::WatchArgs;
