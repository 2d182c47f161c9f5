//! Diagram rendering via the Kroki HTTP service.
//!
//! [`KrokiRenderer`] posts diagram source to `{kroki_url}/mermaid/svg` with
//! the theme prepended as a Mermaid init directive. Rendered SVG is stored
//! in a [`DiagramCache`] under a content hash, so repeated renders of the
//! same source and theme never leave the process.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::json;
use ureq::Agent;

use crate::cache::{DiagramCache, DiagramKey, NullCache};
use crate::consts::{DEFAULT_TIMEOUT, ID_PREFIX, MERMAID_ENDPOINT};
use crate::error::RenderError;
use crate::renderer::DiagramRenderer;
use crate::request::RenderRequestId;
use crate::theme::{Theme, init_directive};

/// Regex to match the `id` attribute of the root `<svg>` element.
static SVG_ROOT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<svg\b[^>]*?\sid="([^"]+)""#).unwrap());

/// Number of hash characters used in scoped SVG ids.
const SCOPED_ID_LEN: usize = 12;

/// Create HTTP agent with the specified timeout.
///
/// Status codes are inspected manually so the error body can be reported.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Renderer backed by a Kroki server.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use rally_diagrams::{KrokiRenderer, MemoryCache};
///
/// let renderer = KrokiRenderer::new("https://kroki.io")
///     .timeout(Duration::from_secs(10))
///     .with_cache(Box::new(MemoryCache::new()));
/// ```
pub struct KrokiRenderer {
    /// Kroki server URL without trailing slash.
    kroki_url: String,
    /// Cache for rendered SVG (defaults to no-op cache).
    cache: Box<dyn DiagramCache>,
    /// HTTP agent for connection pooling (reused across render calls).
    agent: Agent,
    /// Whether Mermaid may emit labels as HTML inside `<foreignObject>`.
    html_labels: bool,
}

impl KrokiRenderer {
    /// Create a renderer for the given Kroki server URL.
    #[must_use]
    pub fn new(kroki_url: impl Into<String>) -> Self {
        let kroki_url: String = kroki_url.into();
        Self {
            kroki_url: kroki_url.trim_end_matches('/').to_owned(),
            cache: Box::new(NullCache),
            agent: create_agent(DEFAULT_TIMEOUT),
            html_labels: true,
        }
    }

    /// Set HTTP timeout for Kroki requests.
    ///
    /// Default is 30 seconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.agent = create_agent(timeout);
        self
    }

    /// Choose between HTML labels (Mermaid's default) and plain SVG text.
    ///
    /// Disable HTML labels when output is sanitized: the sanitizer removes
    /// `<foreignObject>` and with it every HTML label.
    #[must_use]
    pub fn html_labels(mut self, enabled: bool) -> Self {
        self.html_labels = enabled;
        self
    }

    /// Init directive prepended to the diagram source.
    fn directive(&self, theme: &Theme) -> String {
        let mut init = theme.mermaid_init();
        if !self.html_labels {
            init["htmlLabels"] = json!(false);
            init["flowchart"] = json!({ "htmlLabels": false });
        }
        init_directive(&init)
    }

    /// Set the cache for rendered diagrams.
    #[must_use]
    pub fn with_cache(mut self, cache: Box<dyn DiagramCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Send themed source to Kroki and return the SVG body.
    fn send(&self, id: &RenderRequestId, body: &str) -> Result<String, RenderError> {
        let url = format!("{}/{MERMAID_ENDPOINT}/svg", self.kroki_url);

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(body.as_bytes())
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            tracing::debug!(request_id = %id, status, "Kroki rejected diagram");
            return Err(classify_status(status, error_body.trim()));
        }

        body.read_to_string()
            .map_err(|e| RenderError::Unavailable(format!("invalid SVG response: {e}")))
    }
}

impl DiagramRenderer for KrokiRenderer {
    fn render(
        &self,
        id: &RenderRequestId,
        source: &str,
        theme: &Theme,
    ) -> Result<String, RenderError> {
        if source.trim().is_empty() {
            return Err(RenderError::MalformedSource(
                "diagram source is empty".to_owned(),
            ));
        }

        let hash = DiagramKey {
            source,
            endpoint: MERMAID_ENDPOINT,
            theme,
            html_labels: self.html_labels,
        }
        .compute_hash();

        let svg = if let Some(cached) = self.cache.get(&hash) {
            tracing::debug!(request_id = %id, "Diagram cache hit");
            cached
        } else {
            let themed = format!("{}\n{source}", self.directive(theme));
            let svg = self.send(id, &themed)?;
            self.cache.set(&hash, &svg);
            svg
        };

        let scoped_id = format!("{ID_PREFIX}-{}", &hash[..SCOPED_ID_LEN]);
        Ok(scope_svg_ids(&svg, &scoped_id))
    }
}

/// Map a Kroki error status to a render error.
///
/// Kroki answers syntax errors with 4xx; anything else means the service
/// itself is failing.
fn classify_status(status: u16, body: &str) -> RenderError {
    if (400..500).contains(&status) {
        RenderError::MalformedSource(body.to_owned())
    } else {
        RenderError::Unavailable(format!("HTTP {status}: {body}"))
    }
}

/// Give the root SVG element a diagram-specific id.
///
/// Mermaid emits the same root id (`my-svg`) for every diagram, scopes its
/// embedded stylesheet with `#my-svg` and derives marker ids from it
/// (`my-svg_flowchart-v2-pointEnd`). Two diagrams on one page would
/// otherwise restyle each other and share arrowheads, so every id equal to
/// the root id or prefixed by it with `_` is renamed, together with every
/// `#` reference to it. When the root has no id, one is added.
fn scope_svg_ids(svg: &str, scoped_id: &str) -> String {
    let Some(caps) = SVG_ROOT_ID_RE.captures(svg) else {
        return svg.replacen("<svg", &format!(r#"<svg id="{scoped_id}""#), 1);
    };

    // The character after the id decides whether it is the root id or a
    // derived one; `my-svg2` belongs to something else
    let pattern = format!(
        r#"(id="|#){}([_"'\s.{{:),>\[]|$)"#,
        regex::escape(&caps[1])
    );
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(svg, format!("${{1}}{scoped_id}${{2}}"))
            .into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build SVG id pattern, keeping ids");
            svg.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use pretty_assertions::assert_eq;

    /// Address nothing listens on; connections are refused immediately.
    const DEAD_KROKI: &str = "http://127.0.0.1:9";

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(400, "Syntax error in graph"),
            RenderError::MalformedSource("Syntax error in graph".to_owned())
        );
        assert!(classify_status(422, "").is_malformed_source());
        assert_eq!(
            classify_status(503, "overloaded"),
            RenderError::Unavailable("HTTP 503: overloaded".to_owned())
        );
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let renderer = KrokiRenderer::new("https://kroki.io/");
        assert_eq!(renderer.kroki_url, "https://kroki.io");
    }

    #[test]
    fn test_scope_svg_ids_rewrites_root_and_styles() {
        let svg = r#"<svg id="my-svg" width="100"><style>#my-svg{fill:#333;}#my-svg .node rect{stroke:#06b6d4;}</style><g id="flowchart-A-0"></g></svg>"#;
        let result = scope_svg_ids(svg, "diagram-abc");
        assert_eq!(
            result,
            r#"<svg id="diagram-abc" width="100"><style>#diagram-abc{fill:#333;}#diagram-abc .node rect{stroke:#06b6d4;}</style><g id="flowchart-A-0"></g></svg>"#
        );
    }

    #[test]
    fn test_scope_svg_ids_keeps_markers_resolvable() {
        let svg = concat!(
            r#"<svg id="my-svg"><defs>"#,
            r#"<marker id="my-svg_flowchart-v2-pointEnd" class="marker flowchart-v2"><path d="M 0 0 L 10 5 L 0 10 z"/></marker>"#,
            r#"</defs><path class="flowchart-link" marker-end="url(#my-svg_flowchart-v2-pointEnd)"/></svg>"#,
        );
        let result = scope_svg_ids(svg, "diagram-abc");

        assert_eq!(
            result,
            concat!(
                r#"<svg id="diagram-abc"><defs>"#,
                r#"<marker id="diagram-abc_flowchart-v2-pointEnd" class="marker flowchart-v2"><path d="M 0 0 L 10 5 L 0 10 z"/></marker>"#,
                r#"</defs><path class="flowchart-link" marker-end="url(#diagram-abc_flowchart-v2-pointEnd)"/></svg>"#,
            )
        );
        assert!(!result.contains("my-svg"));
    }

    #[test]
    fn test_scope_svg_ids_leaves_unrelated_ids() {
        let svg = r##"<svg id="my-svg"><g id="my-svg2"/><use href="#my-svg2"/><rect fill="#my"/></svg>"##;
        assert_eq!(
            scope_svg_ids(svg, "diagram-abc"),
            r##"<svg id="diagram-abc"><g id="my-svg2"/><use href="#my-svg2"/><rect fill="#my"/></svg>"##
        );
    }

    #[test]
    fn test_svg_labels_directive() {
        let theme = Theme::default();
        let html = KrokiRenderer::new(DEAD_KROKI).directive(&theme);
        let svg = KrokiRenderer::new(DEAD_KROKI)
            .html_labels(false)
            .directive(&theme);

        assert_eq!(html, theme.mermaid_directive());
        assert!(!html.contains("htmlLabels"));
        assert!(svg.starts_with("%%{init: "));
        assert!(svg.contains(r#""flowchart":{"htmlLabels":false}"#));
        assert!(svg.contains(r#""htmlLabels":false"#));
    }

    #[test]
    fn test_scope_svg_ids_adds_missing_id() {
        let svg = r#"<?xml version="1.0"?><svg width="10"></svg>"#;
        assert_eq!(
            scope_svg_ids(svg, "diagram-abc"),
            r#"<?xml version="1.0"?><svg id="diagram-abc" width="10"></svg>"#
        );
    }

    #[test]
    fn test_empty_source_rejected_without_request() {
        let renderer = KrokiRenderer::new(DEAD_KROKI);
        let err = renderer
            .render(&RenderRequestId::generate(), "  \n", &Theme::default())
            .unwrap_err();
        assert!(err.is_malformed_source());
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        let renderer = KrokiRenderer::new(DEAD_KROKI).timeout(Duration::from_secs(2));
        let err = renderer
            .render(
                &RenderRequestId::generate(),
                "graph TD; A-->B",
                &Theme::default(),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::Unavailable(_)), "{err:?}");
    }

    #[test]
    fn test_cache_hit_skips_request() {
        let theme = Theme::default();
        let source = "graph LR; Start-->Finish";
        let hash = DiagramKey {
            source,
            endpoint: MERMAID_ENDPOINT,
            theme: &theme,
            html_labels: true,
        }
        .compute_hash();

        let cache = MemoryCache::new();
        cache.set(&hash, r#"<svg id="my-svg"><text>Start</text><text>Finish</text></svg>"#);

        let renderer = KrokiRenderer::new(DEAD_KROKI).with_cache(Box::new(cache));
        let first = renderer
            .render(&RenderRequestId::generate(), source, &theme)
            .unwrap();
        let second = renderer
            .render(&RenderRequestId::generate(), source, &theme)
            .unwrap();

        assert_eq!(first, second);
        assert!(first.contains("Start") && first.contains("Finish"));
        assert!(first.contains(&format!(r#"id="diagram-{}""#, &hash[..12])));
    }

    #[test]
    fn test_cache_miss_for_other_theme() {
        let theme = Theme::default();
        let source = "graph TD; A-->B";
        let hash = DiagramKey {
            source,
            endpoint: MERMAID_ENDPOINT,
            theme: &theme,
            html_labels: true,
        }
        .compute_hash();

        let cache = MemoryCache::new();
        cache.set(&hash, "<svg/>");

        let renderer = KrokiRenderer::new(DEAD_KROKI)
            .timeout(Duration::from_secs(2))
            .with_cache(Box::new(cache));
        let other_theme = Theme {
            primary_fill: "#000000".to_owned(),
            ..Theme::default()
        };

        let result = renderer.render(&RenderRequestId::generate(), source, &other_theme);
        assert!(matches!(result, Err(RenderError::Unavailable(_))));
    }
}
