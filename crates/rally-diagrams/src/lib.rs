//! Asynchronous diagram rendering.
//!
//! This crate turns diagram-description text into displayed vector markup:
//! - [`DiagramView`] owns a display region and renders asynchronously,
//!   applying only the latest request's result
//! - [`DiagramRenderer`] is the rendering collaborator; [`KrokiRenderer`]
//!   renders through a Kroki server
//! - [`DiagnosticSink`] receives non-fatal failures; [`TracingSink`] logs them
//! - [`Theme`] carries the six color roles applied to every render
//!
//! # Architecture
//!
//! The crate is organized into modules:
//! - [`view`]: `DiagramView` and `RenderState`
//! - [`renderer`]: the `DiagramRenderer` trait
//! - [`kroki`]: HTTP rendering via Kroki
//! - [`cache`]: content-addressed SVG cache backends
//! - [`sink`]: diagnostic reporting
//! - [`theme`]: color roles and Mermaid init directive
//! - [`sanitize`]: optional removal of active content from SVG
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rally_diagrams::{DiagramView, KrokiRenderer, RenderState, Theme, TracingSink};
//!
//! let view = DiagramView::new(
//!     Arc::new(KrokiRenderer::new("https://kroki.io")),
//!     Arc::new(TracingSink),
//!     Theme::default(),
//! );
//!
//! view.set_source("graph LR; Start-->Finish");
//! if let RenderState::Rendered(svg) = view.wait_settled().await {
//!     println!("{svg}");
//! }
//! ```

mod cache;
mod consts;
mod error;
mod kroki;
mod renderer;
mod request;
mod sanitize;
mod sink;
mod theme;
mod view;

pub use cache::{DiagramCache, DiagramKey, FileCache, MemoryCache, NullCache};
pub use error::RenderError;
pub use kroki::KrokiRenderer;
pub use renderer::DiagramRenderer;
pub use request::RenderRequestId;
pub use sanitize::{MarkupPolicy, sanitize_svg};
pub use sink::{DiagnosticSink, ReportContext, TracingSink};
pub use theme::{Theme, ThemeError};
pub use view::{DiagramView, RenderState};
