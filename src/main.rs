//! dynconf - show, watch and encrypt configuration files from the command line.

use std::{error::Error, process};

use clap::Parser;
use dynconf::{
    cli::{Cli, formatting::format_error},
    tracing_config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_config::init()?;

    let cli = Cli::parse();

    match cli.execute().await {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}
