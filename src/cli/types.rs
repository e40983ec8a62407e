use clap::{Args, ValueEnum};
use thiserror::Error;

use crate::{ConfigError, crypto::Decryptor, format::Format};

/// Errors that can occur during CLI command execution.
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid or missing arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Loading, decrypting or watching the configuration failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// The value could not be rendered for output.
    #[error("Output error: {0}")]
    OutputError(String),

    /// A background task or signal handler failed.
    #[error("Service error: {0}")]
    ServiceError(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result of a command: the text to print on success.
pub type CommandResult = Result<String, CliError>;

/// Format names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// YAML document
    Yaml,
    /// TOML document
    Toml,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => Format::Yaml,
            FormatArg::Toml => Format::Toml,
        }
    }
}

/// Key material for `{encrypted}` fields.
///
/// Both values fall back to environment variables so they stay out of shell
/// history. Leaving either empty disables decryption.
#[derive(Args, Debug, Clone, Default)]
pub struct KeyArgs {
    /// Hex-encoded AES key (16, 24 or 32 bytes)
    #[arg(long, env = "DYNCONF_AES_KEY", default_value = "", hide_env_values = true)]
    pub key_hex: String,

    /// Hex-encoded 16 byte IV
    #[arg(long, env = "DYNCONF_AES_IV", default_value = "", hide_env_values = true)]
    pub iv_hex: String,
}

impl KeyArgs {
    /// Decodes the key material, if any was given.
    ///
    /// # Errors
    /// Returns `CliError::ConfigError` if either value is malformed.
    pub fn decryptor(&self) -> Result<Option<Decryptor>, CliError> {
        Ok(Decryptor::from_hex(&self.key_hex, &self.iv_hex)?)
    }
}
