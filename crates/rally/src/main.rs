//! Rally CLI - Mermaid diagram rendering.
//!
//! Provides commands for:
//! - `render`: Render a diagram file once
//! - `watch`: Re-render a diagram file whenever it changes

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{RenderArgs, WatchArgs};
use error::CliError;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rally - diagram rendering for documentation.
#[derive(Parser)]
#[command(name = "rally", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a diagram file once.
    Render(RenderArgs),
    /// Re-render a diagram file whenever it changes.
    Watch(WatchArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Render(args) => args.diagram.verbose,
            Self::Watch(args) => args.diagram.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to ERROR.
    // Logs go to stderr so rendered markup on stdout stays clean.
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| match cli.command {
            Commands::Render(args) => rt.block_on(args.execute(VERSION)),
            Commands::Watch(args) => rt.block_on(args.execute(VERSION)),
        });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_defaults() {
        let cli = Cli::try_parse_from(["rally", "render", "flow.mmd"]).unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render command");
        };
        assert!(!args.diagram.verbose);
        assert!(!cli_verbose_flag(&["rally", "render", "flow.mmd"]));
    }

    #[test]
    fn test_parse_watch_requires_out() {
        assert!(Cli::try_parse_from(["rally", "watch", "flow.mmd"]).is_err());
        assert!(Cli::try_parse_from(["rally", "watch", "flow.mmd", "--out", "flow.html"]).is_ok());
    }

    #[test]
    fn test_verbose_flag() {
        assert!(cli_verbose_flag(&["rally", "render", "flow.mmd", "-v"]));
        assert!(cli_verbose_flag(&[
            "rally", "watch", "flow.mmd", "-o", "out.svg", "--verbose"
        ]));
    }

    fn cli_verbose_flag(args: &[&str]) -> bool {
        Cli::try_parse_from(args).unwrap().command.verbose()
    }
}
