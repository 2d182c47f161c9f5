//! Markup policy applied before rendered SVG is displayed.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Elements removed together with their content.
///
/// `foreignObject` embeds arbitrary HTML, so it goes even though Mermaid
/// uses it for HTML labels.
const ACTIVE_ELEMENTS: [&str; 5] = ["foreignObject", "script", "iframe", "object", "embed"];

/// One regex per active element, matching the element and its content.
///
/// Separate patterns keep an open tag from pairing with another element's
/// closing tag.
static ELEMENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ACTIVE_ELEMENTS
        .iter()
        .map(|name| {
            Regex::new(&format!(r"(?is)<{name}\b[^>]*?(?:/>|>.*?</{name}\s*>)")).unwrap()
        })
        .collect()
});

/// Regex to match unpaired opening or closing tags of active elements.
static STRAY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:foreignObject|script|iframe|object|embed)\b[^>]*>").unwrap()
});

/// Regex to match animation elements that rewrite a link target.
static HREF_ANIMATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(?:set|animate)\b[^>]*?\battributeName\s*=\s*["']?\s*(?:xlink:)?href\b[^>]*>"#,
    )
    .unwrap()
});

/// Regex to match a `/` used as attribute separator right after a tag name
/// (`<svg/onload=...>`).
static SLASH_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(<[a-z][\w:.-]*)/+([a-z])").unwrap());

/// Regex to match inline event handler attributes (`onclick="..."`).
static EVENT_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

/// Regex to match `href`/`xlink:href` attributes with their quoted value.
static HREF_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\b(?:xlink:)?href\s*=\s*)("[^"]*"|'[^']*')"#).unwrap()
});

/// Regex to match numeric character references (`&#106;`, `&#x6A;`).
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&#(x[0-9a-f]+|[0-9]+);?").unwrap());

/// URL schemes that execute code when followed.
const SCRIPT_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

/// How renderer output is treated before display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkupPolicy {
    /// Display renderer output verbatim.
    #[default]
    Trusted,
    /// Strip scripts, embedded HTML, inline event handlers and script links.
    Sanitized,
}

impl MarkupPolicy {
    /// Apply the policy to rendered markup.
    #[must_use]
    pub fn apply(self, markup: String) -> String {
        match self {
            Self::Trusted => markup,
            Self::Sanitized => sanitize_svg(&markup),
        }
    }
}

/// Remove active content from SVG markup.
///
/// Passes repeat until the markup stops changing, so fragments that only
/// form a script once an inner element is removed are caught as well.
#[must_use]
pub fn sanitize_svg(svg: &str) -> String {
    let mut current = svg.to_owned();
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_pass(svg: &str) -> String {
    let mut result = svg.to_owned();
    for re in ELEMENT_RES.iter() {
        result = re.replace_all(&result, "").into_owned();
    }
    let result = STRAY_TAG_RE.replace_all(&result, "");
    let result = HREF_ANIMATION_RE.replace_all(&result, "");
    let result = SLASH_SEPARATOR_RE.replace_all(&result, "${1} ${2}");
    let result = EVENT_ATTR_RE.replace_all(&result, "");
    HREF_ATTR_RE
        .replace_all(&result, |caps: &Captures<'_>| {
            let value = &caps[2];
            if is_script_url(&value[1..value.len() - 1]) {
                format!(r##"{}"#""##, &caps[1])
            } else {
                caps[0].to_owned()
            }
        })
        .into_owned()
}

/// Whether an attribute value, as a browser would read it, is a script URL.
///
/// Character references are decoded and whitespace and control characters
/// dropped first, since browsers ignore them inside the scheme.
fn is_script_url(raw: &str) -> bool {
    let decoded = decode_entities(raw);
    let normalized: String = decoded
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    SCRIPT_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

/// Decode numeric character references and the named ones that can hide a
/// URL scheme.
fn decode_entities(value: &str) -> String {
    let decoded = NUMERIC_ENTITY_RE.replace_all(value, |caps: &Captures<'_>| {
        let digits = &caps[1];
        let code = match digits.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => digits.parse().ok(),
        };
        code.and_then(char::from_u32)
            .map_or_else(String::new, String::from)
    });

    let mut out = decoded.into_owned();
    for (entity, replacement) in [
        ("&colon;", ":"),
        ("&tab;", "\t"),
        ("&newline;", "\n"),
        ("&amp;", "&"),
    ] {
        out = replace_ignore_case(&out, entity, replacement);
    }
    out
}

/// Replace every ASCII case-insensitive occurrence of `needle`.
fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in lower.match_indices(needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = start + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trusted_is_verbatim() {
        let svg = r#"<svg onload="alert(1)"><script>x()</script></svg>"#.to_owned();
        assert_eq!(MarkupPolicy::Trusted.apply(svg.clone()), svg);
    }

    #[test]
    fn test_strips_script_elements() {
        let svg = "<svg><script type=\"text/javascript\">\nalert(1)\n</script><rect/></svg>";
        assert_eq!(sanitize_svg(svg), "<svg><rect/></svg>");
    }

    #[test]
    fn test_strips_self_closing_script() {
        let svg = r#"<svg><script href="evil.js"/><rect/></svg>"#;
        assert_eq!(sanitize_svg(svg), "<svg><rect/></svg>");
    }

    #[test]
    fn test_strips_event_handlers() {
        let svg = r#"<svg onload="alert(1)"><g ONCLICK='go()' class="node"><rect/></g></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg><g class="node"><rect/></g></svg>"#
        );
    }

    #[test]
    fn test_neutralizes_javascript_links() {
        let svg = r#"<svg><a xlink:href="javascript:alert(1)"><text>Start</text></a></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r##"<svg><a xlink:href="#"><text>Start</text></a></svg>"##
        );
    }

    #[test]
    fn test_keeps_shapes_and_labels() {
        let svg = r#"<svg id="diagram-1"><g class="node"><rect width="10"/><text>Start</text></g><path d="M0 0"/></svg>"#;
        assert_eq!(MarkupPolicy::Sanitized.apply(svg.to_owned()), svg);
    }

    #[test]
    fn test_keeps_regular_links() {
        let svg = r#"<svg><a href="https://example.com"><text>Docs</text></a></svg>"#;
        assert_eq!(sanitize_svg(svg), svg);
    }

    #[test]
    fn test_nested_script_does_not_reassemble() {
        let svg = "<svg><scr<script></script>ipt>alert(1)</script></svg>";
        let result = sanitize_svg(svg);
        assert!(!result.to_ascii_lowercase().contains("<script"), "{result}");
        assert_eq!(result, "<svg>alert(1)</svg>");
    }

    #[test]
    fn test_unclosed_script_tag_removed() {
        assert_eq!(sanitize_svg("<svg><rect/><SCRIPT>alert(1)"), "<svg><rect/>alert(1)");
    }

    #[test]
    fn test_entity_encoded_javascript_links() {
        for href in [
            "&#106;avascript:alert(1)",
            "&#x6A;avascript:alert(1)",
            "java&#x09;script:alert(1)",
            "javascript&colon;alert(1)",
            " JaVaScRiPt:alert(1)",
        ] {
            let svg = format!(r#"<svg><a href="{href}"><text>x</text></a></svg>"#);
            assert_eq!(
                sanitize_svg(&svg),
                r##"<svg><a href="#"><text>x</text></a></svg>"##,
                "{href}"
            );
        }
    }

    #[test]
    fn test_double_encoded_ampersand_is_not_decoded_twice() {
        let svg = r#"<svg><a href="&amp;#106;avascript:x"><text>x</text></a></svg>"#;
        assert_eq!(sanitize_svg(svg), svg);
    }

    #[test]
    fn test_strips_foreign_object() {
        let svg = r#"<svg><foreignObject width="80"><div xmlns="http://www.w3.org/1999/xhtml"><iframe src="https://evil.test"></iframe><span>Start</span></div></foreignObject><text>A</text></svg>"#;
        assert_eq!(sanitize_svg(svg), "<svg><text>A</text></svg>");
    }

    #[test]
    fn test_strips_href_animations() {
        let svg = concat!(
            r#"<svg><a><set attributeName="href" to="javascript:alert(1)"/>"#,
            r#"<animate attributeName="xlink:href" values="javascript:alert(1)"></animate>"#,
            r#"<text>x</text></a><animate attributeName="opacity" values="0;1"/></svg>"#,
        );
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg><a></animate><text>x</text></a><animate attributeName="opacity" values="0;1"/></svg>"#
        );
    }

    #[test]
    fn test_slash_separated_event_handler() {
        assert_eq!(sanitize_svg("<svg/onload=alert(1)><rect/></svg>"), "<svg><rect/></svg>");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let svg = r#"<svg onload="x()"><scr<script></script>ipt>y()</script><a href="&#106;avascript:z"/></svg>"#;
        let once = sanitize_svg(svg);
        assert_eq!(sanitize_svg(&once), once);
    }
}
