//! Internal constants for diagram rendering.

use std::time::Duration;

/// Default HTTP timeout for Kroki requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Kroki endpoint used for diagram-description text.
pub const MERMAID_ENDPOINT: &str = "mermaid";

/// Maximum number of characters of source text included in diagnostic reports.
pub const SNIPPET_CHARS: usize = 80;

/// Prefix shared by render request identifiers and scoped SVG ids.
pub const ID_PREFIX: &str = "diagram";
