//! Command-line interface for inspecting, watching and encrypting
//! configuration files.
//!
//! Files are loaded untyped, as JSON values, so any YAML or TOML document can
//! be shown without a Rust type describing it.

mod commands;
pub mod formatting;
mod types;


use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

pub use types::{CliError, CommandResult, FormatArg, KeyArgs};

/// Top-level arguments of the `dynconf` binary.
#[derive(Parser, Debug)]
#[command(name = "dynconf", version)]
#[command(about = "Load, watch and encrypt configuration files")]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands of the `dynconf` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a file once and print it as JSON
    Show {
        /// Configuration file to load
        file: PathBuf,

        /// Override the format implied by the file extension
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Print the file as JSON every time it changes, until Ctrl-C
    Watch {
        /// Configuration file to watch
        file: PathBuf,

        /// Log every reload with its new value
        #[arg(short, long)]
        verbose: bool,

        /// Quiet period before reloading after a change
        #[arg(long, default_value_t = 0)]
        debounce_ms: u64,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Encrypt a value for use as an `{encrypted}` field
    Encrypt {
        /// Text to encrypt
        plaintext: String,

        #[command(flatten)]
        keys: KeyArgs,
    },
}

impl Cli {
    /// Runs the selected subcommand and returns what should be printed.
    ///
    /// # Errors
    /// Returns `CliError` if the subcommand fails.
    pub async fn execute(self) -> CommandResult {
        match self.command {
            Commands::Show { file, format, keys } => {
                commands::show::execute(&file, format.map(Into::into), &keys)
            }
            Commands::Watch {
                file,
                verbose,
                debounce_ms,
                keys,
            } => {
                commands::watch::execute(file, verbose, Duration::from_millis(debounce_ms), &keys)
                    .await
            }
            Commands::Encrypt { plaintext, keys } => commands::encrypt::execute(&plaintext, &keys),
        }
    }
}
