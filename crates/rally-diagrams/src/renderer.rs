//! Rendering collaborator abstraction.

use crate::error::RenderError;
use crate::request::RenderRequestId;
use crate::theme::Theme;

/// Converts diagram-description text into vector markup.
///
/// Implementations must be reentrant: a [`DiagramView`](crate::DiagramView)
/// calls `render` from blocking worker threads, and several views may share
/// one renderer. Output must be deterministic for identical source and theme;
/// `id` correlates the call in logs and reports and may differ per call.
pub trait DiagramRenderer: Send + Sync {
    /// Render `source` with `theme`, returning SVG markup.
    fn render(
        &self,
        id: &RenderRequestId,
        source: &str,
        theme: &Theme,
    ) -> Result<String, RenderError>;
}
