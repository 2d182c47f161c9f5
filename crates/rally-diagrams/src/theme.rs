//! Visual theme applied to every diagram render.
//!
//! A [`Theme`] is a fixed set of six named color roles. The same theme is
//! passed to the renderer on every call, so identical source text always
//! renders identically.

use serde_json::{Value, json};

/// Named color roles understood by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Fill color of primary nodes.
    pub primary_fill: String,
    /// Text color inside primary nodes.
    pub primary_text: String,
    /// Border color of primary nodes.
    pub primary_border: String,
    /// Color of edges connecting nodes.
    pub connector_line: String,
    /// Fill color of secondary nodes.
    pub secondary_fill: String,
    /// Fill color of tertiary nodes and cluster backgrounds.
    pub tertiary_fill: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fill: "#8b5cf6".to_owned(),
            primary_text: "#fff".to_owned(),
            primary_border: "#06b6d4".to_owned(),
            connector_line: "#f97316".to_owned(),
            secondary_fill: "#06b6d4".to_owned(),
            tertiary_fill: "#f97316".to_owned(),
        }
    }
}

/// Theme validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("theme.{role}: '{value}' is not a hex color (expected #rgb, #rrggbb or #rrggbbaa)")]
pub struct ThemeError {
    /// Role name (e.g. `primary_fill`).
    pub role: &'static str,
    /// Rejected value.
    pub value: String,
}

impl Theme {
    /// Color roles as `(role, value)` pairs in a fixed order.
    #[must_use]
    pub fn roles(&self) -> [(&'static str, &str); 6] {
        [
            ("primary_fill", &self.primary_fill),
            ("primary_text", &self.primary_text),
            ("primary_border", &self.primary_border),
            ("connector_line", &self.connector_line),
            ("secondary_fill", &self.secondary_fill),
            ("tertiary_fill", &self.tertiary_fill),
        ]
    }

    /// Check that every role holds a CSS hex color.
    pub fn validate(&self) -> Result<(), ThemeError> {
        for (role, value) in self.roles() {
            if !is_hex_color(value) {
                return Err(ThemeError {
                    role,
                    value: value.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Stable textual form of the theme, used in cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.roles()
            .iter()
            .map(|(_, value)| value.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Mermaid init configuration carrying this theme.
    ///
    /// Mermaid only honours `themeVariables` on the `base` theme.
    #[must_use]
    pub fn mermaid_init(&self) -> Value {
        json!({
            "theme": "base",
            "themeVariables": {
                "primaryColor": self.primary_fill,
                "primaryTextColor": self.primary_text,
                "primaryBorderColor": self.primary_border,
                "lineColor": self.connector_line,
                "secondaryColor": self.secondary_fill,
                "tertiaryColor": self.tertiary_fill,
            },
        })
    }

    /// Mermaid `%%{init: ...}%%` directive carrying this theme.
    #[must_use]
    pub fn mermaid_directive(&self) -> String {
        init_directive(&self.mermaid_init())
    }
}

/// Format a Mermaid init configuration as a directive line.
pub(crate) fn init_directive(init: &Value) -> String {
    format!("%%{{init: {init}}}%%")
}

/// Whether `value` is `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}
