use std::{path::PathBuf, time::Instant};

use crate::ConfigError;

/// Outcome of a registration, manual, watch-triggered or cascaded reload.
///
/// Broadcast to every subscriber of [`crate::WatchRegistry::subscribe`].
/// A cascade runs inside its source's reload, so dependents report before
/// their source; the source's event means the whole cascade has settled.
/// Failures never stop the dispatch loop; they are only reported here and
/// in the logs.
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    /// A watched entry reloaded and republished its value
    Reloaded {
        /// Label of the reloaded cell
        target: String,
        /// When the reload finished
        at: Instant,
    },

    /// A reload failed and the previous value was kept
    Failed {
        /// Label of the cell that failed
        target: String,
        /// Why the reload failed
        error: ConfigError,
    },

    /// A modification was seen for a path with no registered entry
    Unwatched {
        /// Path reported by the watcher
        path: PathBuf,
    },

    /// The underlying watcher reported an error
    WatcherError {
        /// Error details from the watcher
        details: String,
    },
}

impl ReloadEvent {
    /// Label of the cell this event is about, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ReloadEvent::Reloaded { target, .. } | ReloadEvent::Failed { target, .. } => {
                Some(target)
            }
            ReloadEvent::Unwatched { .. } | ReloadEvent::WatcherError { .. } => None,
        }
    }

    /// Whether this event reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReloadEvent::Failed { .. } | ReloadEvent::WatcherError { .. }
        )
    }
}
