use std::time::Duration;

use tokio::sync::broadcast;

use crate::{Result, cell::ReloadContext, crypto::Decryptor};

use super::{FileWatcher, WatchRegistry};

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Construction-time options for a [`WatchRegistry`].
#[derive(Debug, Clone)]
pub struct WatchRegistryBuilder {
    verbose: bool,
    decryptor: Option<Decryptor>,
    debounce: Duration,
    event_capacity: usize,
}

impl Default for WatchRegistryBuilder {
    fn default() -> Self {
        Self {
            verbose: false,
            decryptor: None,
            debounce: Duration::ZERO,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl WatchRegistryBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every successful reload, including the new value, at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enables decryption of `{encrypted}` fields with a hex-encoded key and IV.
    ///
    /// If either string is empty decryption stays disabled.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidKeyMaterial` if either value is not valid hex
    /// or has a length AES-CBC cannot use.
    pub fn encryption(mut self, key_hex: &str, iv_hex: &str) -> Result<Self> {
        self.decryptor = Decryptor::from_hex(key_hex, iv_hex)?;
        Ok(self)
    }

    /// Enables decryption with already decoded key material.
    pub fn decryptor(mut self, decryptor: Decryptor) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Waits for `debounce` of quiet after the last change to a file before
    /// reloading it. Zero reloads on every event.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Capacity of the reload event channel. Slow subscribers skip events
    /// beyond this backlog.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Creates the file watcher and the registry.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatcherInitError` if the file watcher cannot be created.
    pub fn build(self) -> Result<WatchRegistry> {
        let (watcher, channels) = FileWatcher::new()?;
        let (events, _) = broadcast::channel(self.event_capacity);

        let mut context = ReloadContext::new()
            .with_verbose(self.verbose)
            .with_events(events.clone());
        if let Some(decryptor) = self.decryptor {
            context = context.with_decryptor(decryptor);
        }

        Ok(WatchRegistry::from_parts(
            watcher,
            channels,
            context,
            events,
            self.debounce,
        ))
    }
}
