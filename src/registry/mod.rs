//! Path-keyed registry of watched configuration cells.
//!
//! The registry owns one file watcher. Registering an entry loads it once,
//! starts watching its file and maps the canonical path to the entry. After
//! [`WatchRegistry::start`], a single dispatch task turns modification events
//! into reloads, one at a time.

mod builder;
mod dispatch;
mod events;
mod file_watcher;


use std::{
    collections::HashMap,
    fmt::Debug,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use futures::{Stream, StreamExt, future};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument};

pub use builder::WatchRegistryBuilder;
pub use events::ReloadEvent;
pub use file_watcher::{FileEvent, FileEventKind, FileWatcher, WatchChannels};

use crate::{
    ConfigError, Result,
    cell::{ReloadContext, SnapshotCell, WatchEntry},
};

/// Registered entries keyed by canonical path.
pub(crate) type Entries = Arc<RwLock<HashMap<PathBuf, Arc<dyn WatchEntry>>>>;

/// Maps watched files to the cells responsible for them and reloads those
/// cells when the files change.
///
/// At most one entry exists per path; registering the same path again
/// replaces the earlier entry.
pub struct WatchRegistry {
    entries: Entries,
    watcher: Mutex<Option<FileWatcher>>,
    channels: Mutex<Option<WatchChannels>>,
    context: ReloadContext,
    events: broadcast::Sender<ReloadEvent>,
    debounce: Duration,
}

impl WatchRegistry {
    /// Creates a registry with default options: no decryption, quiet logging,
    /// no debounce.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatcherInitError` if the file watcher cannot be created.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Returns a builder for configuring a registry.
    pub fn builder() -> WatchRegistryBuilder {
        WatchRegistryBuilder::new()
    }

    pub(crate) fn from_parts(
        watcher: FileWatcher,
        channels: WatchChannels,
        context: ReloadContext,
        events: broadcast::Sender<ReloadEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            watcher: Mutex::new(Some(watcher)),
            channels: Mutex::new(Some(channels)),
            context,
            events,
            debounce,
        }
    }

    /// Loads `entry`, starts watching its file and records it.
    ///
    /// The initial load happens before the file is watched, so the entry is
    /// readable before any change event can reach it.
    ///
    /// # Errors
    /// Returns the initial reload error, since no previous value exists to fall
    /// back to. Returns `ConfigError::WatcherClosed` after [`WatchRegistry::close`]
    /// and `ConfigError::FileWatchError` if the file cannot be watched.
    #[instrument(skip_all, fields(path = %entry.path().display()))]
    pub fn register(&self, entry: Arc<dyn WatchEntry>) -> Result<()> {
        if self.is_closed()? {
            return Err(ConfigError::WatcherClosed);
        }

        entry.reload(&self.context)?;
        self.context.reloaded(entry.as_ref());

        let canonical = {
            let mut watcher = self.watcher.lock().map_err(ConfigError::write_lock)?;
            let watcher = watcher.as_mut().ok_or(ConfigError::WatcherClosed)?;
            watcher.watch_file(entry.path())?
        };

        let previous = self
            .entries
            .write()
            .map_err(ConfigError::write_lock)?
            .insert(canonical.clone(), entry);

        if previous.is_some() {
            debug!(canonical = %canonical.display(), "Replaced existing entry");
        }
        info!("Registered configuration file");

        Ok(())
    }

    /// Creates a [`SnapshotCell`] for `path`, registers it and returns it.
    ///
    /// # Errors
    /// Same as [`WatchRegistry::register`].
    pub fn register_file<T>(&self, path: impl Into<PathBuf>) -> Result<Arc<SnapshotCell<T>>>
    where
        T: DeserializeOwned + Debug + Send + Sync + 'static,
    {
        let cell = Arc::new(SnapshotCell::new(path));
        self.register(cell.clone())?;
        Ok(cell)
    }

    /// Stops watching `path` and forgets its entry.
    ///
    /// Returns the removed entry, or `None` if nothing was registered. The
    /// entry keeps its last published value.
    ///
    /// # Errors
    /// Returns `ConfigError::WatcherClosed` after [`WatchRegistry::close`] and
    /// `ConfigError::FileWatchError` if the watcher fails to release the path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn unregister(&self, path: impl AsRef<Path>) -> Result<Option<Arc<dyn WatchEntry>>> {
        let path = path.as_ref();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        {
            let mut watcher = self.watcher.lock().map_err(ConfigError::write_lock)?;
            let watcher = watcher.as_mut().ok_or(ConfigError::WatcherClosed)?;
            if watcher.is_watching(&canonical) {
                watcher.unwatch_file(&canonical)?;
            }
        }

        let removed = self
            .entries
            .write()
            .map_err(ConfigError::write_lock)?
            .remove(&canonical);

        if removed.is_some() {
            info!("Unregistered configuration file");
        }

        Ok(removed)
    }

    /// Reloads the entry registered for `path` on the calling thread.
    ///
    /// The outcome is reported to subscribers like a watch-triggered reload.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownEntry` if nothing is registered for the path,
    /// otherwise the entry's reload error.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<()> {
        let entry = self
            .entry(path.as_ref())?
            .ok_or_else(|| ConfigError::UnknownEntry {
                path: path.as_ref().to_path_buf(),
            })?;

        match entry.reload(&self.context) {
            Ok(()) => {
                self.context.reloaded(entry.as_ref());
                Ok(())
            }
            Err(error) => {
                self.context.emit(ReloadEvent::Failed {
                    target: entry.label(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Looks up the entry registered for `path`.
    ///
    /// # Errors
    /// Returns `ConfigError::LockError` if the registry lock is poisoned.
    pub fn entry(&self, path: &Path) -> Result<Option<Arc<dyn WatchEntry>>> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        Ok(self
            .entries
            .read()
            .map_err(ConfigError::read_lock)?
            .get(&canonical)
            .cloned())
    }

    /// Canonical paths of every registered entry.
    ///
    /// # Errors
    /// Returns `ConfigError::LockError` if the registry lock is poisoned.
    pub fn watched_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .read()
            .map_err(ConfigError::read_lock)?
            .keys()
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// The context every reload through this registry uses.
    pub fn context(&self) -> &ReloadContext {
        &self.context
    }

    /// Subscribes to reload outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Reload outcomes as a stream.
    ///
    /// Events missed because the subscriber fell behind are skipped.
    pub fn events(&self) -> impl Stream<Item = ReloadEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|event| future::ready(event.ok()))
    }

    /// Releases the file watcher, which ends the dispatch loop.
    ///
    /// Reloads already in progress are not interrupted.
    ///
    /// # Errors
    /// Returns `ConfigError::WatcherClosed` if the registry was already closed.
    #[instrument(skip(self))]
    pub fn close(&self) -> Result<()> {
        let watcher = self
            .watcher
            .lock()
            .map_err(ConfigError::write_lock)?
            .take()
            .ok_or(ConfigError::WatcherClosed)?;

        drop(watcher);
        info!("Closed configuration watcher");
        Ok(())
    }

    fn is_closed(&self) -> Result<bool> {
        Ok(self
            .watcher
            .lock()
            .map_err(ConfigError::read_lock)?
            .is_none())
    }
}
