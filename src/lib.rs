//! dynconf - Typed, hot-reloadable configuration cells.
//!
//! A configuration file is parsed into a typed snapshot that readers fetch
//! without locking. When the file changes, the registry re-parses it and swaps
//! in a new snapshot; a failed reload keeps the previous one. The main
//! features include:
//!
//! - Lock-free snapshot reads through [`SnapshotCell`]
//! - Derived values that follow their source through [`DerivedCell`]
//! - File watching and serial reload dispatch through [`WatchRegistry`]
//! - AES-CBC decryption of `{encrypted}` fields
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dynconf::{DerivedCell, WatchRegistry};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! # async fn run() -> dynconf::Result<()> {
//! let registry = WatchRegistry::new()?;
//! let server = registry.register_file::<Server>("server.yaml")?;
//! let address = DerivedCell::attach(&server, |s: &Server| format!("{}:{}", s.host, s.port))?;
//!
//! let _dispatch = registry.start()?;
//! println!("listening on {}", address.get());
//! # Ok(())
//! # }
//! ```

/// Snapshot and derived cells and the traits that connect them.
pub mod cell;

/// Command-line interface of the `dynconf` binary.
pub mod cli;

/// AES-CBC decryption of `{encrypted}` configuration fields.
pub mod crypto;

/// Error types and result aliases.
pub mod error;

/// Structured-text formats configuration files are parsed from.
pub mod format;

/// File watching and reload dispatch.
pub mod registry;

/// Tracing subscriber setup for the binary.
pub mod tracing_config;

pub use cell::{DerivedCell, Reload, ReloadContext, SnapshotCell, Source, WatchEntry};
pub use crypto::Decryptor;
pub use error::{ConfigError, Result};
pub use format::Format;
pub use registry::{ReloadEvent, WatchRegistry, WatchRegistryBuilder};
