//! Options and helpers shared by `render` and `watch`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use rally_config::{CliSettings, Config};
use rally_diagrams::{
    DiagnosticSink, DiagramView, FileCache, KrokiRenderer, MarkupPolicy, RenderError,
    ReportContext, TracingSink,
};

use crate::error::CliError;
use crate::output::Output;

/// Output format for rendered diagrams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display region: `<div class="diagram ...">` wrapping the SVG.
    #[default]
    Html,
    /// Bare SVG markup.
    Svg,
}

impl OutputFormat {
    /// Content to write for the view's current display, if anything is shown.
    pub(crate) fn content(self, view: &DiagramView) -> Option<String> {
        let markup = view.markup()?;
        Some(match self {
            Self::Html => view.to_html(),
            Self::Svg => markup,
        })
    }
}

/// Diagram rendering options.
#[derive(Args)]
pub(crate) struct DiagramArgs {
    /// Path to configuration file (default: auto-discover rally.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Kroki server URL (overrides config).
    #[arg(long)]
    kroki_url: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,

    /// Extra CSS class for the diagram container (html format).
    #[arg(long = "class", default_value = "")]
    style_class: String,

    /// Disable the rendered diagram cache.
    #[arg(long)]
    no_cache: bool,

    /// Strip scripts and event handlers from rendered SVG.
    #[arg(long)]
    sanitize: bool,

    /// Enable verbose output (show render timing and cache logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl DiagramArgs {
    /// Load configuration with CLI overrides applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            kroki_url: self.kroki_url.clone(),
            cache_enabled: self.no_cache.then_some(false),
            sanitize: self.sanitize.then_some(true),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Build a diagram view backed by Kroki as configured.
    pub(crate) fn build_view(
        &self,
        config: &Config,
        version: &str,
    ) -> Result<DiagramView, CliError> {
        // Theme colors were validated when the config was loaded
        let theme = config.theme.to_theme();

        // Sanitizing strips <foreignObject>, so labels must be plain SVG text
        let mut renderer = KrokiRenderer::new(&config.diagrams.kroki_url)
            .timeout(Duration::from_secs(config.diagrams.timeout_secs))
            .html_labels(!config.diagrams.sanitize);

        if config.cache_resolved.enabled {
            ensure_project_dir(&config.cache_resolved.project_dir)?;
            renderer = renderer.with_cache(Box::new(FileCache::new(
                config.cache_resolved.dir.clone(),
                version,
            )));
        }

        let policy = if config.diagrams.sanitize {
            MarkupPolicy::Sanitized
        } else {
            MarkupPolicy::Trusted
        };

        Ok(
            DiagramView::new(Arc::new(renderer), Arc::new(ConsoleSink::new()), theme)
                .style_class(self.style_class.clone())
                .markup_policy(policy),
        )
    }
}

/// Diagnostic sink printing failures to the terminal and the log.
pub(crate) struct ConsoleSink {
    output: Output,
}

impl ConsoleSink {
    pub(crate) fn new() -> Self {
        Self {
            output: Output::new(),
        }
    }
}

impl DiagnosticSink for ConsoleSink {
    fn report(&self, error: &RenderError, context: &ReportContext) {
        TracingSink.report(error, context);
        self.output
            .warning(&format!("Diagram rendering failed: {error}"));
        self.output.info(&format!("  source: {}", context.source_snippet));
    }
}

/// Write content to `path`, or to stdout when no path is given.
pub(crate) fn write_output(path: Option<&Path>, content: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.write_all(b"\n")?;
            stdout.flush()
        }
    }
}

/// Ensure the `.rally/` project directory exists with a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by rally\n*\n");
    }

    Ok(())
}
