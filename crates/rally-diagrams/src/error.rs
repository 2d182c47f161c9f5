//! Rendering error types.

/// Failure of a single render.
///
/// Both kinds are recovered by [`DiagramView`](crate::DiagramView): the
/// failure is reported to the diagnostic sink and the display keeps what it
/// showed before.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The diagram-description text could not be parsed by the renderer.
    #[error("malformed diagram source: {0}")]
    MalformedSource(String),
    /// The renderer could not be reached or failed internally.
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    /// Whether the failure was caused by the diagram source itself.
    #[must_use]
    pub fn is_malformed_source(&self) -> bool {
        matches!(self, Self::MalformedSource(_))
    }
}
