//! Configuration management for the rally diagram renderer.
//!
//! Parses `rally.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `diagrams.kroki_url`
//! - `cache.dir`

mod expand;

use rally_diagrams::Theme;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override Kroki URL for diagram rendering.
    pub kroki_url: Option<String>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override markup sanitization flag.
    pub sanitize: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rally.toml";

/// Project data directory, relative to the config file.
const PROJECT_DIR: &str = ".rally";

/// Upper bound for `diagrams.timeout_secs`.
const MAX_TIMEOUT_SECS: u64 = 600;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagram rendering configuration.
    pub diagrams: DiagramsConfig,
    /// Color roles applied to every diagram.
    pub theme: ThemeConfig,
    /// Cache configuration (paths are relative strings from TOML).
    cache: CacheConfigRaw,

    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Diagram rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiagramsConfig {
    /// Kroki server URL.
    pub kroki_url: String,
    /// HTTP timeout for Kroki requests, in seconds.
    pub timeout_secs: u64,
    /// Strip scripts and event handlers from rendered SVG.
    pub sanitize: bool,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            kroki_url: "https://kroki.io".to_owned(),
            timeout_secs: 30,
            sanitize: false,
        }
    }
}

/// Color roles, as CSS hex colors.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThemeConfig {
    pub primary_fill: String,
    pub primary_text: String,
    pub primary_border: String,
    pub connector_line: String,
    pub secondary_fill: String,
    pub tertiary_fill: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        let Theme {
            primary_fill,
            primary_text,
            primary_border,
            connector_line,
            secondary_fill,
            tertiary_fill,
        } = Theme::default();
        Self {
            primary_fill,
            primary_text,
            primary_border,
            connector_line,
            secondary_fill,
            tertiary_fill,
        }
    }
}

impl ThemeConfig {
    /// Renderer theme carrying these colors.
    #[must_use]
    pub fn to_theme(&self) -> Theme {
        Theme {
            primary_fill: self.primary_fill.clone(),
            primary_text: self.primary_text.clone(),
            primary_border: self.primary_border.clone(),
            connector_line: self.connector_line.clone(),
            secondary_fill: self.secondary_fill.clone(),
            tertiary_fill: self.tertiary_fill.clone(),
        }
    }
}

/// Raw cache configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
}

/// Resolved cache configuration with absolute paths.
#[derive(Debug, Default)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Directory holding rendered diagrams.
    pub dir: PathBuf,
    /// Project directory for rally data (.rally/).
    pub project_dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`diagrams.kroki_url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `rally.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, then the
    /// result is validated again so overrides cannot bypass validation.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or a value is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(kroki_url) = &settings.kroki_url {
            self.diagrams.kroki_url.clone_from(kroki_url);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = cache_enabled;
        }
        if let Some(sanitize) = settings.sanitize {
            self.diagrams.sanitize = sanitize;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let project_dir = base.join(PROJECT_DIR);
        Self {
            diagrams: DiagramsConfig::default(),
            theme: ThemeConfig::default(),
            cache: CacheConfigRaw::default(),
            cache_resolved: CacheConfig {
                enabled: true,
                dir: project_dir.join("cache"),
                project_dir,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_diagrams()?;
        self.validate_theme()?;
        Ok(())
    }

    /// Validate diagrams configuration.
    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.diagrams.kroki_url, "diagrams.kroki_url")?;
        require_http_url(&self.diagrams.kroki_url, "diagrams.kroki_url")?;

        let timeout = self.diagrams.timeout_secs;
        if timeout == 0 {
            return Err(ConfigError::Validation(
                "diagrams.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if timeout > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "diagrams.timeout_secs cannot exceed {MAX_TIMEOUT_SECS}"
            )));
        }

        Ok(())
    }

    /// Validate theme colors.
    fn validate_theme(&self) -> Result<(), ConfigError> {
        self.theme
            .to_theme()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.diagrams.kroki_url =
            expand::expand_env(&self.diagrams.kroki_url, "diagrams.kroki_url")?;

        if let Some(ref dir) = self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let project_dir = config_dir.join(PROJECT_DIR);
        let dir = match self.cache.dir.as_deref() {
            Some(dir) => config_dir.join(dir),
            None => project_dir.join("cache"),
        };

        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            dir,
            project_dir,
        };
    }
}
