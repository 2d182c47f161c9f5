//! Diagnostic reporting for failed renders.

use crate::consts::SNIPPET_CHARS;
use crate::error::RenderError;
use crate::request::RenderRequestId;

/// Context attached to a failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    /// Identifier of the failed render.
    pub request_id: RenderRequestId,
    /// Leading part of the diagram source.
    pub source_snippet: String,
}

impl ReportContext {
    /// Build a context for a render of `source`.
    #[must_use]
    pub fn new(request_id: RenderRequestId, source: &str) -> Self {
        Self {
            request_id,
            source_snippet: snippet(source),
        }
    }
}

/// Records non-fatal render failures.
///
/// `report` is fire-and-forget: it must not block for long and must not
/// panic. It is called outside any view lock.
pub trait DiagnosticSink: Send + Sync {
    /// Record a failed render.
    fn report(&self, error: &RenderError, context: &ReportContext);
}

/// Sink that emits a `tracing` warning per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &RenderError, context: &ReportContext) {
        tracing::warn!(
            request_id = %context.request_id,
            snippet = %context.source_snippet,
            error = %error,
            "Diagram rendering failed"
        );
    }
}

/// First [`SNIPPET_CHARS`] characters of `source`, single-line.
///
/// Newlines are folded to spaces so the snippet fits on one log line.
fn snippet(source: &str) -> String {
    let trimmed = source.trim();
    let mut out: String = trimmed
        .chars()
        .take(SNIPPET_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if trimmed.chars().nth(SNIPPET_CHARS).is_some() {
        out.push('…');
    }
    out
}
