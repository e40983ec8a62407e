//! Structured-text formats a configuration cell can be parsed from.

use std::{borrow::Cow, path::Path, str};

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{ConfigError, Result, crypto::Decryptor};

/// Structured-text format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// YAML documents
    #[default]
    Yaml,
    /// TOML documents
    Toml,
}

impl Format {
    /// Picks a format from the file extension.
    ///
    /// `.toml` files are read as TOML, everything else as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Yaml,
        }
    }

    /// Parses bytes into a typed value.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` if the text is malformed or does not
    /// match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8], path: Option<&Path>) -> Result<T> {
        match self {
            Format::Yaml => {
                serde_yaml_ng::from_slice(bytes).map_err(|e| ConfigError::parse(e, path))
            }
            Format::Toml => {
                let text = str::from_utf8(bytes).map_err(|e| ConfigError::parse(e, path))?;
                toml::from_str(text).map_err(|e| ConfigError::parse(e, path))
            }
        }
    }

    /// Serializes a typed value back to structured text.
    ///
    /// # Errors
    /// Returns `ConfigError::SerializationError` if the value cannot be represented.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            Format::Yaml => {
                serde_yaml_ng::to_string(value).map_err(|e| ConfigError::serialization(e, "yaml"))
            }
            Format::Toml => {
                toml::to_string(value).map_err(|e| ConfigError::serialization(e, "toml"))
            }
        }
    }

    /// Decrypts every top-level string value carrying the `{encrypted}` marker.
    ///
    /// The document is parsed into an untyped mapping, marked values are replaced
    /// with their plaintext and the mapping is serialized again. Nested values are
    /// not inspected. When nothing is encrypted, or the document is empty, the
    /// input is returned unchanged.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` if the document cannot be parsed or its
    /// top level is not a mapping,
    /// `ConfigError::DecryptError` for the first field that fails to decrypt and
    /// `ConfigError::SerializationError` if the mapping cannot be written back.
    pub fn decrypt_fields<'a>(
        &self,
        bytes: &'a [u8],
        decryptor: &Decryptor,
        path: Option<&Path>,
    ) -> Result<Cow<'a, [u8]>> {
        let decrypted = match self {
            Format::Yaml => decrypt_yaml(bytes, decryptor, path)?,
            Format::Toml => decrypt_toml(bytes, decryptor, path)?,
        };

        Ok(match decrypted {
            Some(text) => Cow::Owned(text.into_bytes()),
            None => Cow::Borrowed(bytes),
        })
    }
}

fn decrypt_yaml(bytes: &[u8], decryptor: &Decryptor, path: Option<&Path>) -> Result<Option<String>> {
    let mut document: serde_yaml_ng::Value =
        serde_yaml_ng::from_slice(bytes).map_err(|e| ConfigError::parse(e, path))?;

    let mapping = match &mut document {
        serde_yaml_ng::Value::Mapping(mapping) => mapping,
        serde_yaml_ng::Value::Null => return Ok(None),
        other => {
            return Err(ConfigError::parse(
                format!("expected a top-level mapping, found {}", yaml_kind(other)),
                path,
            ));
        }
    };

    let mut decrypted = 0;
    for (key, value) in mapping.iter_mut() {
        let serde_yaml_ng::Value::String(text) = value else {
            continue;
        };

        if let Some(plaintext) = decryptor.decrypt_marked(text) {
            let field = key.as_str().map(str::to_string).unwrap_or_else(|| format!("{key:?}"));
            *text = plaintext.map_err(|source| ConfigError::DecryptError { field, source })?;
            decrypted += 1;
        }
    }

    if decrypted == 0 {
        return Ok(None);
    }

    debug!(fields = decrypted, "Decrypted YAML fields");
    serde_yaml_ng::to_string(&document)
        .map(Some)
        .map_err(|e| ConfigError::serialization(e, "decrypted mapping"))
}

fn yaml_kind(value: &serde_yaml_ng::Value) -> &'static str {
    match value {
        serde_yaml_ng::Value::Null => "null",
        serde_yaml_ng::Value::Bool(_) => "a boolean",
        serde_yaml_ng::Value::Number(_) => "a number",
        serde_yaml_ng::Value::String(_) => "a string",
        serde_yaml_ng::Value::Sequence(_) => "a sequence",
        serde_yaml_ng::Value::Mapping(_) => "a mapping",
        serde_yaml_ng::Value::Tagged(_) => "a tagged value",
    }
}

fn decrypt_toml(bytes: &[u8], decryptor: &Decryptor, path: Option<&Path>) -> Result<Option<String>> {
    let text = str::from_utf8(bytes).map_err(|e| ConfigError::parse(e, path))?;
    let mut table: toml::Table = toml::from_str(text).map_err(|e| ConfigError::parse(e, path))?;

    let mut decrypted = 0;
    for (key, value) in table.iter_mut() {
        let toml::Value::String(text) = value else {
            continue;
        };

        if let Some(plaintext) = decryptor.decrypt_marked(text) {
            *text = plaintext.map_err(|source| ConfigError::DecryptError {
                field: key.clone(),
                source,
            })?;
            decrypted += 1;
        }
    }

    if decrypted == 0 {
        return Ok(None);
    }

    debug!(fields = decrypted, "Decrypted TOML fields");
    toml::to_string(&table)
        .map(Some)
        .map_err(|e| ConfigError::serialization(e, "decrypted mapping"))
}
