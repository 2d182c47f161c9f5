//! Change debouncing for a single watched file.
//!
//! Editors often emit several events per save (truncate, write, rename over).
//! Those are folded into one pending change that fires once the file has been
//! quiet for the debounce window.

use std::time::{Duration, Instant};

/// Kind of change observed on the watched file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug)]
struct Pending {
    kind: ChangeKind,
    deadline: Instant,
}

/// Debouncer for one path, owned by the watch loop.
#[derive(Debug)]
pub(crate) struct FileDebouncer {
    pending: Option<Pending>,
    window: Duration,
}

impl FileDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: None,
            window,
        }
    }

    /// Record a change, pushing the deadline out by the debounce window.
    pub(crate) fn record(&mut self, kind: ChangeKind) {
        let deadline = Instant::now() + self.window;
        self.pending = match self.pending.take() {
            None => Some(Pending { kind, deadline }),
            Some(existing) => {
                Self::coalesce(existing.kind, kind).map(|kind| Pending { kind, deadline })
            }
        };
    }

    /// Coalesce two change kinds. `None` means both cancel out.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
        use ChangeKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created | Modified) => Some(Created),
            // Never existed as far as the watcher is concerned
            (Created, Removed) => None,

            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Removed) => Some(Removed),

            // Atomic save: replaced via rename
            (Removed, Created) => Some(Modified),
            (Removed, Modified | Removed) => Some(Removed),
        }
    }

    /// Take the pending change if its deadline has passed.
    pub(crate) fn drain_ready(&mut self) -> Option<ChangeKind> {
        match &self.pending {
            Some(pending) if pending.deadline <= Instant::now() => {
                self.pending.take().map(|p| p.kind)
            }
            _ => None,
        }
    }
}
