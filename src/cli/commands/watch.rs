use std::{path::PathBuf, time::Duration};

use futures::StreamExt;
use serde_json::Value;

use crate::{
    cli::{
        CliError, CommandResult, KeyArgs,
        formatting::{format_error, format_usage, format_warning, render_json},
    },
    registry::{ReloadEvent, WatchRegistry},
};

pub async fn execute(
    file: PathBuf,
    verbose: bool,
    debounce: Duration,
    keys: &KeyArgs,
) -> CommandResult {
    let mut builder = WatchRegistry::builder()
        .verbose(verbose)
        .debounce(debounce);
    if let Some(decryptor) = keys.decryptor()? {
        builder = builder.decryptor(decryptor);
    }

    let registry = builder.build()?;
    let cell = registry.register_file::<Value>(&file)?;
    println!("{}", render_json(&cell.get())?);

    let events = registry.events();
    tokio::pin!(events);
    let handle = registry.start()?;

    eprintln!(
        "{}",
        format_usage(&format!("Watching '{}', press Ctrl+C to stop", file.display()))
    );

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(ReloadEvent::Reloaded { .. }) => {
                    println!("{}", render_json(&cell.get())?);
                }
                Some(ReloadEvent::Failed { target, error }) => {
                    eprintln!("{}", format_error(&format!("{target}: {error}")));
                }
                Some(ReloadEvent::WatcherError { details }) => {
                    eprintln!("{}", format_warning(&details));
                }
                Some(ReloadEvent::Unwatched { .. }) => {}
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    registry.close()?;
    handle
        .await
        .map_err(|e| CliError::ServiceError(format!("dispatch loop failed: {e}")))?;

    Ok(String::new())
}
