use std::{
    fmt,
    path::{Path, PathBuf},
    result,
};

use thiserror::Error;

use crate::crypto::DecryptError;

/// Errors that can occur while loading, reloading or watching configuration cells.
///
/// Every variant carries its details as owned strings so that errors can be
/// cloned onto the reload event channel.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The backing file could not be read
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Structured text was malformed or did not match the target type
    #[error("failed to parse {location}: {details}")]
    ParseError {
        /// Location of the text being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// Error occurred while serializing a value back to structured text
    #[error("failed to serialize {content_type}: {details}")]
    SerializationError {
        /// Type of content being serialized (e.g., "decrypted mapping")
        content_type: String,
        /// Serialization error details
        details: String,
    },

    /// An encrypted field could not be decrypted
    #[error("failed to decrypt field '{field}': {source}")]
    DecryptError {
        /// Top-level key of the encrypted field
        field: String,
        /// Underlying cipher failure
        #[source]
        source: DecryptError,
    },

    /// A derived cell's transform failed or panicked
    #[error("transform failed for {target}: {details}")]
    TransformError {
        /// Description of the derived cell
        target: String,
        /// Failure details or panic message
        details: String,
    },

    /// Key or IV supplied at construction was not valid hex
    #[error("invalid {field}: {details}")]
    InvalidKeyMaterial {
        /// Which piece of key material was rejected ("key" or "iv")
        field: String,
        /// Decoding error details
        details: String,
    },

    /// A cell was read before it completed its first load
    #[error("{target} has not been loaded yet")]
    Unpopulated {
        /// Description of the cell
        target: String,
    },

    /// A reload panicked instead of returning an error
    #[error("reload of {target} panicked: {details}")]
    ReloadPanicked {
        /// Label of the entry being reloaded
        target: String,
        /// Panic details
        details: String,
    },

    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {details}")]
    FileWatcherInitError {
        /// File watcher initialization error details
        details: String,
    },

    /// Error occurred while watching a specific file
    #[error("file watcher error for '{path}': {details}")]
    FileWatchError {
        /// Path being watched when error occurred
        path: PathBuf,
        /// File watcher error details
        details: String,
    },

    /// The registry's watcher has already been closed
    #[error("watch registry is closed")]
    WatcherClosed,

    /// The dispatch loop was started outside a Tokio runtime
    #[error("dispatch loop needs a Tokio runtime: {details}")]
    NoRuntime {
        /// Runtime lookup error details
        details: String,
    },

    /// The dispatch loop was already started
    #[error("dispatch loop already started")]
    AlreadyStarted,

    /// No entry is registered for the given path
    #[error("no entry registered for '{path}'")]
    UnknownEntry {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Error occurred while acquiring locks for thread-safe access
    #[error("failed to acquire {lock_type} lock: {details}")]
    LockError {
        /// Type of lock that failed (read, write)
        lock_type: String,
        /// Lock error details
        details: String,
    },
}

/// A specialized `Result` type for configuration cell operations.
pub type Result<T> = result::Result<T, ConfigError>;

impl ConfigError {
    /// Creates an I/O error for the given path.
    pub fn io(error: impl fmt::Display, path: &Path) -> Self {
        ConfigError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }

    /// Creates a parse error with optional file path context.
    ///
    /// # Arguments
    ///
    /// * `error` - The underlying parsing error
    /// * `path` - Optional path to the file that failed to parse
    pub fn parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                clean_path.to_string_lossy().to_string()
            }
            None => "string".to_string(),
        };

        ConfigError::ParseError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates a serialization error for the given content type.
    pub fn serialization(error: impl fmt::Display, content_type: &str) -> Self {
        ConfigError::SerializationError {
            content_type: content_type.to_string(),
            details: error.to_string(),
        }
    }

    pub(crate) fn read_lock(error: impl fmt::Display) -> Self {
        ConfigError::LockError {
            lock_type: "read".to_string(),
            details: error.to_string(),
        }
    }

    pub(crate) fn write_lock(error: impl fmt::Display) -> Self {
        ConfigError::LockError {
            lock_type: "write".to_string(),
            details: error.to_string(),
        }
    }
}
