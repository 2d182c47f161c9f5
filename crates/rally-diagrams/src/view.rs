//! Displayed diagram with asynchronous rendering.
//!
//! [`DiagramView`] owns one display region. Each distinct source text starts
//! one render on a blocking worker; completions are applied only if they
//! belong to the latest request and the view has not been torn down.
//!
//! State transitions:
//!
//! ```text
//! Empty ──set_source──▶ Rendering ──ok──▶ Rendered(markup)
//!                           │
//!                           └──err──▶ Failed
//! Rendered / Failed ──set_source(new text)──▶ Rendering
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::RenderError;
use crate::renderer::DiagramRenderer;
use crate::request::RenderRequestId;
use crate::sanitize::MarkupPolicy;
use crate::sink::{DiagnosticSink, ReportContext};
use crate::theme::Theme;

/// Lifecycle state of a [`DiagramView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    /// No source text has been set yet.
    Empty,
    /// A render for the latest source text is in flight.
    Rendering,
    /// The latest render succeeded with this markup.
    Rendered(String),
    /// The latest render failed. The display keeps earlier markup, if any.
    Failed,
}

impl RenderState {
    /// Whether the state is final for the current source text.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Rendering)
    }
}

/// Mutable view state guarded by one lock.
#[derive(Default)]
struct ViewState {
    /// Last source text accepted by `set_source`.
    source: Option<String>,
    /// Bumped on every accepted source change.
    generation: u64,
    /// Markup currently shown in the display region.
    displayed: Option<String>,
    /// Set on teardown; completions become no-ops.
    detached: bool,
}

/// State shared between the view and its in-flight renders.
struct Shared {
    state: Mutex<ViewState>,
    status: watch::Sender<RenderState>,
    in_flight: watch::Sender<usize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to one render: its generation plus access to the view state.
///
/// Applying a result goes through [`RenderTicket::complete`], which drops
/// results from superseded generations or detached views.
struct RenderTicket {
    generation: u64,
    shared: Arc<Shared>,
}

impl RenderTicket {
    fn complete(
        self,
        id: RenderRequestId,
        source: &str,
        result: Result<String, RenderError>,
        sink: &dyn DiagnosticSink,
        policy: MarkupPolicy,
    ) {
        let failure = {
            let mut state = self.shared.lock();
            if state.detached {
                tracing::debug!(request_id = %id, "View torn down, dropping render result");
                return;
            }
            if state.generation != self.generation {
                tracing::debug!(
                    request_id = %id,
                    generation = self.generation,
                    latest = state.generation,
                    "Dropping superseded render result"
                );
                return;
            }

            match result {
                Ok(markup) => {
                    let markup = policy.apply(markup);
                    state.displayed = Some(markup.clone());
                    self.shared
                        .status
                        .send_replace(RenderState::Rendered(markup));
                    None
                }
                Err(error) => {
                    self.shared.status.send_replace(RenderState::Failed);
                    Some(error)
                }
            }
        };

        if let Some(error) = failure {
            sink.report(&error, &ReportContext::new(id, source));
        }
    }
}

/// Decrements the in-flight counter when a render task ends, even on panic.
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// A displayed diagram.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use rally_diagrams::{DiagramView, KrokiRenderer, Theme, TracingSink};
///
/// let view = DiagramView::new(
///     Arc::new(KrokiRenderer::new("https://kroki.io")),
///     Arc::new(TracingSink),
///     Theme::default(),
/// )
/// .style_class("wide");
///
/// view.set_source("graph LR; Start-->Finish");
/// let state = view.wait_settled().await;
/// ```
pub struct DiagramView {
    shared: Arc<Shared>,
    renderer: Arc<dyn DiagramRenderer>,
    sink: Arc<dyn DiagnosticSink>,
    theme: Arc<Theme>,
    policy: MarkupPolicy,
    style_class: String,
}

impl DiagramView {
    /// Create an empty view.
    #[must_use]
    pub fn new(
        renderer: Arc<dyn DiagramRenderer>,
        sink: Arc<dyn DiagnosticSink>,
        theme: Theme,
    ) -> Self {
        let (status, _) = watch::channel(RenderState::Empty);
        let (in_flight, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ViewState::default()),
                status,
                in_flight,
            }),
            renderer,
            sink,
            theme: Arc::new(theme),
            policy: MarkupPolicy::default(),
            style_class: String::new(),
        }
    }

    /// Set an extra CSS class for the display region.
    #[must_use]
    pub fn style_class(mut self, class: impl Into<String>) -> Self {
        self.style_class = class.into();
        self
    }

    /// Set how rendered markup is treated before display.
    #[must_use]
    pub fn markup_policy(mut self, policy: MarkupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Display `source`, starting a render if it differs from the last value.
    ///
    /// Returns `true` if the text was accepted. Setting the same text again,
    /// or any text after teardown, is a no-op.
    ///
    /// The renderer runs on the blocking pool of the current Tokio runtime.
    /// Without a runtime the render fails as [`RenderError::Unavailable`]
    /// and is reported like any other failure.
    pub fn set_source(&self, source: impl Into<String>) -> bool {
        let source: String = source.into();

        let ticket = {
            let mut state = self.shared.lock();
            if state.detached || state.source.as_deref() == Some(source.as_str()) {
                return false;
            }
            state.source = Some(source.clone());
            state.generation += 1;
            self.shared.status.send_replace(RenderState::Rendering);
            RenderTicket {
                generation: state.generation,
                shared: Arc::clone(&self.shared),
            }
        };

        let id = RenderRequestId::generate();

        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(request_id = %id, "No Tokio runtime, cannot start render");
            let error = RenderError::Unavailable("no Tokio runtime to render on".to_owned());
            ticket.complete(id, &source, Err(error), self.sink.as_ref(), self.policy);
            return true;
        };

        tracing::debug!(request_id = %id, generation = ticket.generation, "Starting diagram render");

        self.shared.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(Arc::clone(&self.shared));
        let renderer = Arc::clone(&self.renderer);
        let sink = Arc::clone(&self.sink);
        let theme = Arc::clone(&self.theme);
        let policy = self.policy;

        runtime.spawn_blocking(move || {
            let _guard = guard;
            let result = renderer.render(&id, &source, &theme);
            ticket.complete(id, &source, result, sink.as_ref(), policy);
        });

        true
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RenderState {
        self.shared.status.borrow().clone()
    }

    /// Markup currently shown, if any.
    ///
    /// After a failed render this is still the markup of the last success.
    #[must_use]
    pub fn markup(&self) -> Option<String> {
        self.shared.lock().displayed.clone()
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.shared.status.subscribe()
    }

    /// Wait until the latest render has completed or failed.
    ///
    /// Never resolves if the view is torn down while rendering.
    pub async fn wait_settled(&self) -> RenderState {
        let mut rx = self.subscribe();
        match rx.wait_for(RenderState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Wait until no render task of this view is running.
    ///
    /// Unlike [`wait_settled`](Self::wait_settled), this also waits for
    /// superseded and post-teardown renders to finish.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stop applying render results to this view.
    ///
    /// Renders already in flight run to completion; their results are
    /// dropped. Later `set_source` calls are ignored.
    pub fn teardown(&self) {
        self.shared.lock().detached = true;
    }

    /// Whether [`teardown`](Self::teardown) has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.shared.lock().detached
    }

    /// HTML of the display region.
    ///
    /// The region carries the `diagram-pending` class while the first render
    /// is in flight.
    #[must_use]
    pub fn to_html(&self) -> String {
        let markup = self.markup();
        let mut classes = String::from("diagram");
        if markup.is_none() && self.state() == RenderState::Rendering {
            classes.push_str(" diagram-pending");
        }
        if !self.style_class.is_empty() {
            classes.push(' ');
            classes.push_str(&escape_attr(&self.style_class));
        }
        format!(
            r#"<div class="{classes}">{}</div>"#,
            markup.as_deref().unwrap_or_default()
        )
    }
}

impl Drop for DiagramView {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Escape a value for use inside a double-quoted HTML attribute.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
