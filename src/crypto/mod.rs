//! Field-level AES-CBC decryption for encrypted configuration values.
//!
//! A configuration value of the form `"{encrypted}<base64>"` carries
//! ciphertext produced with AES in CBC mode and PKCS#7 padding. The key length
//! selects the cipher: 16, 24 or 32 bytes for AES-128, AES-192 or AES-256.

use std::{fmt, result};

use aes::{Aes128, Aes192, Aes256};
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use thiserror::Error;

use crate::{ConfigError, Result};

/// Marker prefix identifying an encrypted string value.
pub const ENCRYPTED_PREFIX: &str = "{encrypted}";

/// AES block size, which is also the required IV length.
const IV_LEN: usize = 16;

/// Failures while decrypting a single field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// The ciphertext was not valid standard base64
    #[error("ciphertext is not valid base64: {0}")]
    InvalidBase64(String),

    /// The key is not 16, 24 or 32 bytes long
    #[error("invalid AES key length {0}, expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),

    /// The IV is not one block long
    #[error("invalid IV length {0}, expected 16 bytes")]
    InvalidIvLength(usize),

    /// The ciphertext length or its PKCS#7 padding is inconsistent
    #[error("ciphertext has corrupt padding")]
    InvalidPadding,

    /// The decrypted bytes are not UTF-8 text
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Key material for decrypting `{encrypted}` fields.
#[derive(Clone, PartialEq, Eq)]
pub struct Decryptor {
    key: Vec<u8>,
    iv: [u8; IV_LEN],
}

impl Decryptor {
    /// Creates a decryptor from raw key and IV bytes.
    ///
    /// # Errors
    /// Returns `DecryptError::InvalidKeyLength` or `DecryptError::InvalidIvLength`
    /// if the material does not fit AES-CBC.
    pub fn new(key: &[u8], iv: &[u8]) -> result::Result<Self, DecryptError> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(DecryptError::InvalidKeyLength(key.len()));
        }

        let iv: [u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| DecryptError::InvalidIvLength(iv.len()))?;

        Ok(Self {
            key: key.to_vec(),
            iv,
        })
    }

    /// Creates a decryptor from hex-encoded key and IV.
    ///
    /// Returns `Ok(None)` when either string is empty, which disables decryption.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidKeyMaterial` if either string is not valid hex
    /// or decodes to a length AES-CBC cannot use.
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Option<Self>> {
        if key_hex.is_empty() || iv_hex.is_empty() {
            return Ok(None);
        }

        let key = decode_hex("key", key_hex)?;
        let iv = decode_hex("iv", iv_hex)?;

        Self::new(&key, &iv)
            .map(Some)
            .map_err(|e| ConfigError::InvalidKeyMaterial {
                field: match e {
                    DecryptError::InvalidIvLength(_) => "iv".to_string(),
                    _ => "key".to_string(),
                },
                details: e.to_string(),
            })
    }

    /// Decrypts base64 ciphertext into plaintext.
    ///
    /// # Errors
    /// Returns `DecryptError` on malformed base64, corrupt padding or non-UTF-8 output.
    pub fn decrypt(&self, ciphertext_base64: &str) -> result::Result<String, DecryptError> {
        let ciphertext = STANDARD
            .decode(ciphertext_base64.trim())
            .map_err(|e| DecryptError::InvalidBase64(e.to_string()))?;

        let plaintext = match self.key.len() {
            16 => cbc_decrypt::<cbc::Decryptor<Aes128>>(&self.key, &self.iv, &ciphertext)?,
            24 => cbc_decrypt::<cbc::Decryptor<Aes192>>(&self.key, &self.iv, &ciphertext)?,
            32 => cbc_decrypt::<cbc::Decryptor<Aes256>>(&self.key, &self.iv, &ciphertext)?,
            n => return Err(DecryptError::InvalidKeyLength(n)),
        };

        String::from_utf8(plaintext).map_err(|_| DecryptError::InvalidUtf8)
    }

    /// Decrypts `value` if it carries the [`ENCRYPTED_PREFIX`] marker.
    ///
    /// Returns `None` for plain values, which must be left untouched.
    pub fn decrypt_marked(&self, value: &str) -> Option<result::Result<String, DecryptError>> {
        value
            .strip_prefix(ENCRYPTED_PREFIX)
            .map(|ciphertext| self.decrypt(ciphertext))
    }

    /// Encrypts plaintext into base64 ciphertext, without the marker prefix.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = match self.key.len() {
            16 => cbc_encrypt::<cbc::Encryptor<Aes128>>(&self.key, &self.iv, plaintext),
            24 => cbc_encrypt::<cbc::Encryptor<Aes192>>(&self.key, &self.iv, plaintext),
            _ => cbc_encrypt::<cbc::Encryptor<Aes256>>(&self.key, &self.iv, plaintext),
        };

        STANDARD.encode(ciphertext)
    }

    /// Encrypts plaintext and prepends the [`ENCRYPTED_PREFIX`] marker.
    pub fn encrypt_marked(&self, plaintext: &str) -> String {
        format!("{ENCRYPTED_PREFIX}{}", self.encrypt(plaintext))
    }
}

impl fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryptor")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// Decrypts a single base64 ciphertext with the given raw key and IV.
///
/// # Errors
/// Returns `DecryptError` on malformed base64, wrong key or IV length,
/// corrupt padding or non-UTF-8 output.
pub fn decrypt(
    ciphertext_base64: &str,
    key: &[u8],
    iv: &[u8],
) -> result::Result<String, DecryptError> {
    Decryptor::new(key, iv)?.decrypt(ciphertext_base64)
}

/// Encrypts plaintext with the given raw key and IV, returning base64 ciphertext.
///
/// # Errors
/// Returns `DecryptError` if the key or IV length is invalid.
pub fn encrypt(plaintext: &str, key: &[u8], iv: &[u8]) -> result::Result<String, DecryptError> {
    Ok(Decryptor::new(key, iv)?.encrypt(plaintext))
}

fn cbc_decrypt<D>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> result::Result<Vec<u8>, DecryptError>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let decryptor =
        D::new_from_slices(key, iv).map_err(|_| DecryptError::InvalidKeyLength(key.len()))?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptError::InvalidPadding)
}

fn cbc_encrypt<E>(key: &[u8], iv: &[u8], plaintext: &str) -> Vec<u8>
where
    E: KeyIvInit + BlockEncryptMut,
{
    match E::new_from_slices(key, iv) {
        Ok(encryptor) => encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
        // lengths are validated in Decryptor::new
        Err(_) => Vec::new(),
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| ConfigError::InvalidKeyMaterial {
        field: field.to_string(),
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests;
