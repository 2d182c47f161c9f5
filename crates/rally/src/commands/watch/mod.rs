//! `rally watch` command implementation.
//!
//! Re-renders a diagram whenever its source file changes and rewrites the
//! output file after each successful render. A failed render keeps the last
//! good output in place.

mod debouncer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rally_diagrams::{DiagramView, RenderState};
use tokio::sync::mpsc;

use self::debouncer::{ChangeKind, FileDebouncer};
use super::common::{DiagramArgs, OutputFormat, write_output};
use crate::error::CliError;
use crate::output::Output;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Arguments for the watch command.
#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Diagram source file (Mermaid syntax).
    file: PathBuf,

    /// Output file, rewritten after every successful render.
    #[arg(short, long)]
    out: PathBuf,

    #[command(flatten)]
    pub diagram: DiagramArgs,
}

impl WatchArgs {
    /// Execute the watch command until interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the file does not exist, or
    /// the file watcher cannot be started.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.diagram.load_config()?;

        let file = std::fs::canonicalize(&self.file).map_err(|e| CliError::Read {
            path: self.file.clone(),
            source: e,
        })?;
        let watch_dir = file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let view = self.diagram.build_view(&config, version)?;
        let mut status = view.subscribe();

        let (tx, mut rx) = mpsc::channel::<Event>(100);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        load_source(&view, &file, &output);
        output.info(&format!(
            "Watching {} -> {} (Ctrl+C to stop)",
            self.file.display(),
            self.out.display()
        ));

        let mut debouncer = FileDebouncer::new(DEBOUNCE_WINDOW);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(event) = rx.recv() => record_event(&event, &file, &mut debouncer),
                _ = ticker.tick() => match debouncer.drain_ready() {
                    Some(ChangeKind::Removed) => output.warning(&format!(
                        "{} was removed; keeping last output",
                        self.file.display()
                    )),
                    Some(_) => load_source(&view, &file, &output),
                    None => {}
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = status.borrow_and_update().clone();
                    match write_rendered(&state, &view, self.diagram.format, &self.out) {
                        Ok(true) => output.success(&format!("Updated {}", self.out.display())),
                        Ok(false) => {}
                        Err(e) => output.error(&format!(
                            "Failed to write {}: {e}",
                            self.out.display()
                        )),
                    }
                }
            }
        }

        view.teardown();
        drop(watcher);
        output.info("Stopped watching");
        Ok(())
    }
}

/// Write the view's display to `out` if `state` is a successful render.
///
/// Returns `Ok(false)` without touching `out` for any other state, so a
/// failed render leaves the last good output in place.
fn write_rendered(
    state: &RenderState,
    view: &DiagramView,
    format: OutputFormat,
    out: &Path,
) -> std::io::Result<bool> {
    if !matches!(state, RenderState::Rendered(_)) {
        return Ok(false);
    }
    let Some(content) = format.content(view) else {
        return Ok(false);
    };
    write_output(Some(out), &content)?;
    Ok(true)
}

/// Read the watched file and hand its contents to the view.
fn load_source(view: &DiagramView, file: &Path, output: &Output) {
    match std::fs::read_to_string(file) {
        Ok(source) => {
            if !view.set_source(source) {
                tracing::debug!(path = %file.display(), "Source unchanged, skipping render");
            }
        }
        Err(e) => output.warning(&format!("Failed to read {}: {e}", file.display())),
    }
}

/// Record a raw filesystem event that touches the watched file.
fn record_event(event: &Event, file: &Path, debouncer: &mut FileDebouncer) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return,
    };

    // The parent directory is watched, so siblings and editor temp files show up too
    if event
        .paths
        .iter()
        .any(|path| path.file_name() == file.file_name())
    {
        debouncer.record(kind);
        tracing::debug!(path = %file.display(), ?kind, "Recorded filesystem event");
    }
}
