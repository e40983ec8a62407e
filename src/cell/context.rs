use std::{sync::Arc, time::Instant};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{crypto::Decryptor, registry::ReloadEvent};

use super::Reload;

/// Settings shared by every reload performed through one registry.
///
/// Carries the optional decryption key material, the verbose logging flag and
/// the channel reload outcomes are reported on. The default context performs
/// no decryption and reports nowhere.
#[derive(Debug, Clone, Default)]
pub struct ReloadContext {
    decryptor: Option<Arc<Decryptor>>,
    verbose: bool,
    events: Option<broadcast::Sender<ReloadEvent>>,
}

impl ReloadContext {
    /// Creates a context with no decryption and quiet logging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables decryption of `{encrypted}` fields with the given key material.
    pub fn with_decryptor(mut self, decryptor: Decryptor) -> Self {
        self.decryptor = Some(Arc::new(decryptor));
        self
    }

    /// Logs every successful reload at info level instead of debug.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub(crate) fn with_events(mut self, events: broadcast::Sender<ReloadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Key material for the decryption pre-pass, if configured.
    pub fn decryptor(&self) -> Option<&Decryptor> {
        self.decryptor.as_deref()
    }

    /// Whether successful reloads are logged at info level.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub(crate) fn emit(&self, event: ReloadEvent) {
        if let Some(events) = &self.events {
            // no receivers is fine
            let _ = events.send(event);
        }
    }

    /// Logs a successful reload and reports it to subscribers.
    pub(crate) fn reloaded<R: Reload + ?Sized>(&self, cell: &R) {
        let target = cell.label();
        if self.verbose {
            info!("Reloaded {}", cell.describe());
        } else {
            debug!(target_cell = %target, "Reloaded");
        }

        self.emit(ReloadEvent::Reloaded {
            target,
            at: Instant::now(),
        });
    }
}
