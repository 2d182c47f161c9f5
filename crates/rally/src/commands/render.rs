//! `rally render` command implementation.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use rally_diagrams::RenderState;

use super::common::{DiagramArgs, write_output};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Diagram source file (Mermaid syntax).
    file: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    pub diagram: DiagramArgs,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the file cannot be read, or
    /// the diagram fails to render.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.diagram.load_config()?;

        let source = std::fs::read_to_string(&self.file).map_err(|e| CliError::Read {
            path: self.file.clone(),
            source: e,
        })?;

        let view = self.diagram.build_view(&config, version)?;
        let start = Instant::now();

        view.set_source(source);
        let RenderState::Rendered(_) = view.wait_settled().await else {
            return Err(CliError::Render(self.file));
        };
        tracing::info!(
            file = %self.file.display(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Diagram rendered"
        );

        let content = self.diagram.format.content(&view).unwrap_or_default();
        write_output(self.out.as_deref(), &content)?;

        if let Some(out) = &self.out {
            output.success(&format!(
                "Rendered {} -> {}",
                self.file.display(),
                out.display()
            ));
        }

        Ok(())
    }
}
