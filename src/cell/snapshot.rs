use std::{
    borrow::Cow,
    fmt::{self, Debug},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use arc_swap::ArcSwapOption;
use serde::{Serialize, de::DeserializeOwned};

use crate::{ConfigError, Result, format::Format};

use super::{Dependents, Reload, ReloadContext, Source, WatchEntry};

/// A typed value parsed from a file and republished on every reload.
///
/// The cell starts empty and is populated by its first [`Reload::reload`],
/// normally performed by [`crate::WatchRegistry::register`]. Each successful
/// reload replaces the snapshot wholesale; a failed reload leaves the previous
/// snapshot in place.
pub struct SnapshotCell<T> {
    path: PathBuf,
    format: Format,
    current: ArcSwapOption<T>,
    dependents: Dependents,
}

impl<T> SnapshotCell<T> {
    /// Creates an empty cell for the file at `path`.
    ///
    /// The format is picked from the file extension; see [`Format::from_path`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = Format::from_path(&path);

        Self {
            path,
            format,
            current: ArcSwapOption::empty(),
            dependents: Dependents::default(),
        }
    }

    /// Overrides the format picked from the file extension.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Returns the current snapshot.
    ///
    /// This is a single atomic load and never blocks on a reload in progress.
    ///
    /// # Panics
    /// Panics if the cell has never completed a reload. Cells obtained from
    /// [`crate::WatchRegistry::register_file`] or [`SnapshotCell::load`] are
    /// always populated.
    #[allow(clippy::panic)]
    pub fn get(&self) -> Arc<T> {
        match self.current.load_full() {
            Some(value) => value,
            None => panic!(
                "configuration '{}' was read before its initial load",
                self.path.display()
            ),
        }
    }

    /// Returns the current snapshot, or `None` before the first successful reload.
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.current.load_full()
    }

    /// Whether the cell has completed at least one reload.
    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format the backing file is parsed with.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of live dependents attached to this cell.
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }
}

impl<T> SnapshotCell<T>
where
    T: DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Creates a cell and performs its initial load.
    ///
    /// # Errors
    /// Returns the reload error if the file cannot be read, decrypted or parsed.
    pub fn load(path: impl Into<PathBuf>, ctx: &ReloadContext) -> Result<Self> {
        let cell = Self::new(path);
        cell.reload(ctx)?;
        Ok(cell)
    }

    fn read_value(&self, ctx: &ReloadContext) -> Result<T> {
        let raw = fs::read(&self.path).map_err(|e| ConfigError::io(e, &self.path))?;

        let bytes = match ctx.decryptor() {
            Some(decryptor) => self
                .format
                .decrypt_fields(&raw, decryptor, Some(&self.path))?,
            None => Cow::Borrowed(raw.as_slice()),
        };

        self.format.decode(&bytes, Some(&self.path))
    }
}

impl<T: Serialize> SnapshotCell<T> {
    /// Serializes the current snapshot with the cell's format.
    ///
    /// Decrypted fields are written back as plaintext.
    ///
    /// # Errors
    /// Returns `ConfigError::Unpopulated` before the first load and
    /// `ConfigError::SerializationError` if the value cannot be represented.
    pub fn marshal(&self) -> Result<String> {
        let value = self.try_get().ok_or_else(|| ConfigError::Unpopulated {
            target: self.path.display().to_string(),
        })?;

        self.format.encode(value.as_ref())
    }
}

impl<T> Reload for SnapshotCell<T>
where
    T: DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn reload(&self, ctx: &ReloadContext) -> Result<()> {
        let value = self.read_value(ctx)?;
        self.current.store(Some(Arc::new(value)));

        self.dependents.cascade(ctx, &self.label());
        Ok(())
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn describe(&self) -> String {
        match self.try_get() {
            Some(value) => format!(
                "SnapshotCell {{ path: {}, value: {:?} }}",
                self.path.display(),
                value
            ),
            None => format!("SnapshotCell {{ path: {}, unloaded }}", self.path.display()),
        }
    }
}

impl<T> WatchEntry for SnapshotCell<T>
where
    T: DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Source<T> for SnapshotCell<T>
where
    T: DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn snapshot(&self) -> Option<Arc<T>> {
        self.try_get()
    }

    fn add_dependent(&self, dependent: Weak<dyn Reload>) {
        self.dependents.push(dependent);
    }
}

impl<T: Debug> Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("value", &self.current.load_full())
            .finish()
    }
}
