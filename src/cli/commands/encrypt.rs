use crate::cli::{CliError, CommandResult, KeyArgs};

pub fn execute(plaintext: &str, keys: &KeyArgs) -> CommandResult {
    let decryptor = keys.decryptor()?.ok_or_else(|| {
        CliError::InvalidArguments(
            "'encrypt' needs --key-hex and --iv-hex (or DYNCONF_AES_KEY and DYNCONF_AES_IV)"
                .to_string(),
        )
    })?;

    Ok(decryptor.encrypt_marked(plaintext))
}
