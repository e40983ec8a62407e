use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{CreateKind, ModifyKind},
    recommended_watcher,
};
use tokio::sync::mpsc;

use crate::{ConfigError, Result};

/// Represents a file system event for a watched file.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path of the file that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEventKind {
    /// File content was modified
    Modified,
    /// File was created
    Created,
    /// File was removed
    Removed,
}

/// Receiving ends of the watcher's event and error channels.
///
/// Both channels close once the [`FileWatcher`] that feeds them is dropped.
pub struct WatchChannels {
    /// File change notifications
    pub events: mpsc::UnboundedReceiver<FileEvent>,
    /// Errors reported by the underlying watcher
    pub errors: mpsc::UnboundedReceiver<String>,
}

/// Cross-platform file system watcher for monitoring configuration files.
///
/// Provides an async interface over the notify crate for watching file changes
/// and converting them to Tokio-compatible async events.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched_files: HashSet<PathBuf>,
}

impl FileWatcher {
    /// Creates a new file watcher and returns the watcher and its channels.
    ///
    /// Uses unbounded channels since file events are typically infrequent but bursty.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatcherInitError` if the underlying file system
    /// watcher cannot be initialized.
    pub fn new() -> Result<(Self, WatchChannels)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    let _ = error_tx.send(e.to_string());
                    return;
                }
            };

            let Some(kind) = classify(&event.kind) else {
                return;
            };

            for path in event.paths {
                let _ = event_tx.send(FileEvent {
                    path,
                    kind: kind.clone(),
                });
            }
        })
        .map_err(|e| ConfigError::FileWatcherInitError {
            details: e.to_string(),
        })?;

        let file_watcher = (
            Self {
                watcher,
                watched_files: HashSet::new(),
            },
            WatchChannels {
                events: event_rx,
                errors: error_rx,
            },
        );

        Ok(file_watcher)
    }

    /// Adds a file to the watch list and returns its canonical path.
    ///
    /// Files are canonicalized to handle symlinks and relative paths, and events
    /// are reported under the canonical path. If the file is already being
    /// watched, this operation is a no-op.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatchError` if the path cannot be canonicalized
    /// or the watcher fails to monitor it.
    pub fn watch_file(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|e| watch_error(path, e))?;

        if self.watched_files.contains(&canonical) {
            return Ok(canonical);
        }

        self.watcher
            .watch(&canonical, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(path, e))?;

        self.watched_files.insert(canonical.clone());

        Ok(canonical)
    }

    /// Removes a file from the watch list.
    ///
    /// If the file is not currently being watched, this operation is a no-op.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatchError` if the watcher fails to stop monitoring.
    pub fn unwatch_file(&mut self, canonical: &Path) -> Result<()> {
        if self.watched_files.remove(canonical) {
            self.watcher
                .unwatch(canonical)
                .map_err(|e| watch_error(canonical, e))?;
        }

        Ok(())
    }

    /// Whether the given canonical path is being watched.
    pub fn is_watching(&self, canonical: &Path) -> bool {
        self.watched_files.contains(canonical)
    }
}

fn classify(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(FileEventKind::Modified),
        EventKind::Create(CreateKind::File | CreateKind::Any) => Some(FileEventKind::Created),
        EventKind::Remove(_) => Some(FileEventKind::Removed),
        _ => None,
    }
}

fn watch_error(path: &Path, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::FileWatchError {
        path: path.to_path_buf(),
        details: error.to_string(),
    }
}
