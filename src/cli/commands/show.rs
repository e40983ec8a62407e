use std::path::Path;

use serde_json::Value;

use crate::{
    cell::{Reload, ReloadContext, SnapshotCell},
    cli::{CommandResult, KeyArgs, formatting::render_json},
    format::Format,
};

pub fn execute(file: &Path, format: Option<Format>, keys: &KeyArgs) -> CommandResult {
    let mut context = ReloadContext::new();
    if let Some(decryptor) = keys.decryptor()? {
        context = context.with_decryptor(decryptor);
    }

    let mut cell = SnapshotCell::<Value>::new(file);
    if let Some(format) = format {
        cell = cell.with_format(format);
    }

    cell.reload(&context)?;
    render_json(&cell.get())
}
