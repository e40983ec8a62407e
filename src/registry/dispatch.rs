use std::{
    mem,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{runtime::Handle, task, task::JoinHandle, time};
use tracing::{debug, info, trace, warn};

use crate::{
    ConfigError, Result,
    cell::{ReloadContext, WatchEntry},
};

use super::{Entries, FileEventKind, ReloadEvent, WatchChannels, WatchRegistry};

impl WatchRegistry {
    /// Starts the dispatch loop that reloads entries when their files change.
    ///
    /// The loop is spawned on the current Tokio runtime and runs until
    /// [`WatchRegistry::close`] releases the watcher; a failed reload is
    /// reported and the loop keeps going.
    ///
    /// # Errors
    /// Returns `ConfigError::AlreadyStarted` on a second call,
    /// `ConfigError::WatcherClosed` after the registry was closed and
    /// `ConfigError::NoRuntime` outside a Tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        if self.is_closed()? {
            return Err(ConfigError::WatcherClosed);
        }

        let runtime = Handle::try_current().map_err(|e| ConfigError::NoRuntime {
            details: e.to_string(),
        })?;

        let channels = self
            .channels
            .lock()
            .map_err(ConfigError::write_lock)?
            .take()
            .ok_or(ConfigError::AlreadyStarted)?;

        let dispatcher = Dispatcher {
            entries: Arc::clone(&self.entries),
            context: self.context.clone(),
            debounce: self.debounce,
        };

        info!(debounce = ?self.debounce, "Starting dispatch loop");
        Ok(runtime.spawn(dispatcher.run(channels)))
    }
}

struct Dispatcher {
    entries: Entries,
    context: ReloadContext,
    debounce: Duration,
}

impl Dispatcher {
    async fn run(self, mut channels: WatchChannels) {
        let mut pending: Vec<PathBuf> = Vec::new();

        let debounce_sleep = time::sleep(self.debounce);
        tokio::pin!(debounce_sleep);

        loop {
            tokio::select! {
                event = channels.events.recv() => {
                    let Some(event) = event else {
                        break;
                    };

                    if event.kind != FileEventKind::Modified {
                        trace!(path = %event.path.display(), kind = ?event.kind, "Ignoring file event");
                        continue;
                    }

                    if self.debounce.is_zero() {
                        self.dispatch(event.path).await;
                    } else {
                        if !pending.contains(&event.path) {
                            pending.push(event.path);
                        }
                        debounce_sleep.as_mut().reset(time::Instant::now() + self.debounce);
                    }
                }

                Some(details) = channels.errors.recv() => {
                    warn!(%details, "File watcher reported an error");
                    self.context.emit(ReloadEvent::WatcherError { details });
                }

                () = &mut debounce_sleep, if !pending.is_empty() => {
                    for path in mem::take(&mut pending) {
                        self.dispatch(path).await;
                    }
                }
            }
        }

        debug!("Dispatch loop stopped");
    }

    async fn dispatch(&self, path: PathBuf) {
        let entry = match self.lookup(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(path = %path.display(), "Change for unwatched path");
                self.context.emit(ReloadEvent::Unwatched { path });
                return;
            }
            Err(error) => {
                warn!(%error, "Failed to look up entry");
                return;
            }
        };

        let target = entry.label();
        let context = self.context.clone();
        let reloading = Arc::clone(&entry);

        let outcome = task::spawn_blocking(move || reloading.reload(&context))
            .await
            .unwrap_or_else(|e| {
                Err(ConfigError::ReloadPanicked {
                    target: target.clone(),
                    details: e.to_string(),
                })
            });

        match outcome {
            Ok(()) => self.context.reloaded(entry.as_ref()),
            Err(error) => {
                warn!(path = %path.display(), %error, "Failed to reload configuration");
                self.context.emit(ReloadEvent::Failed { target, error });
            }
        }
    }

    fn lookup(&self, path: &Path) -> Result<Option<Arc<dyn WatchEntry>>> {
        Ok(self
            .entries
            .read()
            .map_err(ConfigError::read_lock)?
            .get(path)
            .cloned())
    }
}
