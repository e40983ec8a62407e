//! Atomically published configuration cells.
//!
//! A [`SnapshotCell`] holds the most recently parsed value of a file and a
//! [`DerivedCell`] holds a value computed from another cell. Both publish whole
//! snapshots through a single atomic pointer swap, so readers never take a lock
//! and never observe a partially built value.
//!
//! Reloading a cell republishes it and then reloads its dependents in
//! registration order. The cascade as a whole is not atomic: a reader may see a
//! source's new snapshot while a dependent still holds the value derived from
//! the previous one.

mod context;
mod dependents;
mod derived;
mod snapshot;

#[cfg(test)]
mod tests;

use std::{
    path::Path,
    sync::{Arc, Weak},
};

pub use context::ReloadContext;
pub use derived::DerivedCell;
pub use snapshot::SnapshotCell;

pub(crate) use dependents::Dependents;

use crate::Result;

/// Anything that can recompute and republish its value.
pub trait Reload: Send + Sync {
    /// Recomputes the value and publishes it, then reloads dependents.
    ///
    /// # Errors
    /// Returns the stage that failed. The previously published value is kept.
    fn reload(&self, ctx: &ReloadContext) -> Result<()>;

    /// Short identifier used in logs and reload events.
    fn label(&self) -> String;

    /// Human readable description including the current value.
    fn describe(&self) -> String;
}

/// A reloadable cell backed by a file the registry can watch.
pub trait WatchEntry: Reload {
    /// Path of the backing file, as given at construction.
    fn path(&self) -> &Path;
}

/// A cell other cells can derive their values from.
pub trait Source<T>: Reload {
    /// The current snapshot, or `None` before the first successful load.
    fn snapshot(&self) -> Option<Arc<T>>;

    /// Appends a dependent to be reloaded after every republish.
    ///
    /// Dependents are held weakly; dropping the last handle detaches them.
    fn add_dependent(&self, dependent: Weak<dyn Reload>);
}
