//! Unit tests for field decryption.
//! No filesystem, timing, or external dependencies.

#![allow(clippy::unwrap_used)]

use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::{
    ConfigError,
    crypto::{DecryptError, Decryptor, ENCRYPTED_PREFIX, decrypt, encrypt},
};

const KEY_HEX: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
const IV_HEX: &str = "000102030405060708090a0b0c0d0e0f";

fn key() -> Vec<u8> {
    hex::decode(KEY_HEX).unwrap()
}

fn iv() -> Vec<u8> {
    hex::decode(IV_HEX).unwrap()
}

#[test]
fn decrypts_helloworld_with_matching_key() {
    let ciphertext = encrypt("helloworld", &key(), &iv()).unwrap();

    assert_eq!(STANDARD.decode(&ciphertext).unwrap().len(), 16);
    assert_eq!(decrypt(&ciphertext, &key(), &iv()).unwrap(), "helloworld");
}

#[test]
fn block_aligned_plaintext_gets_full_padding_block() {
    let plaintext = "0123456789abcdef";
    let ciphertext = encrypt(plaintext, &key(), &iv()).unwrap();

    assert_eq!(STANDARD.decode(&ciphertext).unwrap().len(), 32);
    assert_eq!(decrypt(&ciphertext, &key(), &iv()).unwrap(), plaintext);
}

#[test]
fn supports_aes128_and_aes192_keys() {
    for len in [16, 24] {
        let key = vec![7u8; len];
        let ciphertext = encrypt("secret", &key, &iv()).unwrap();
        assert_eq!(decrypt(&ciphertext, &key, &iv()).unwrap(), "secret");
    }
}

#[test]
fn rejects_malformed_base64() {
    let err = decrypt("not base64!!", &key(), &iv()).unwrap_err();
    assert!(matches!(err, DecryptError::InvalidBase64(_)));
}

#[test]
fn rejects_wrong_key_length() {
    let err = decrypt("AAAA", &[1u8; 10], &iv()).unwrap_err();
    assert_eq!(err, DecryptError::InvalidKeyLength(10));
}

#[test]
fn rejects_wrong_iv_length() {
    let err = decrypt("AAAA", &key(), &[0u8; 8]).unwrap_err();
    assert_eq!(err, DecryptError::InvalidIvLength(8));
}

#[test]
fn rejects_zero_padding_byte() {
    let block = cbc::Encryptor::<Aes256>::new_from_slices(&key(), &iv())
        .unwrap()
        .encrypt_padded_vec_mut::<NoPadding>(&[0u8; 16]);

    let err = decrypt(&STANDARD.encode(block), &key(), &iv()).unwrap_err();
    assert_eq!(err, DecryptError::InvalidPadding);
}

#[test]
fn rejects_ciphertext_not_multiple_of_block_size() {
    let err = decrypt(&STANDARD.encode([1u8; 10]), &key(), &iv()).unwrap_err();
    assert_eq!(err, DecryptError::InvalidPadding);
}

#[test]
fn decrypt_marked_ignores_plain_values() {
    let decryptor = Decryptor::new(&key(), &iv()).unwrap();

    assert!(decryptor.decrypt_marked("plain value").is_none());
    assert!(decryptor.decrypt_marked("prefix {encrypted}late").is_none());
}

#[test]
fn decrypt_marked_strips_prefix() {
    let decryptor = Decryptor::new(&key(), &iv()).unwrap();
    let marked = decryptor.encrypt_marked("helloworld");

    assert!(marked.starts_with(ENCRYPTED_PREFIX));
    assert_eq!(
        decryptor.decrypt_marked(&marked).unwrap().unwrap(),
        "helloworld"
    );
}

#[test]
fn from_hex_with_missing_material_disables_decryption() {
    assert!(Decryptor::from_hex("", IV_HEX).unwrap().is_none());
    assert!(Decryptor::from_hex(KEY_HEX, "").unwrap().is_none());
}

#[test]
fn from_hex_rejects_malformed_hex() {
    let err = Decryptor::from_hex("zz", IV_HEX).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidKeyMaterial { ref field, .. } if field == "key"
    ));

    let err = Decryptor::from_hex(KEY_HEX, "0g").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidKeyMaterial { ref field, .. } if field == "iv"
    ));
}

#[test]
fn from_hex_rejects_unusable_lengths() {
    let err = Decryptor::from_hex(KEY_HEX, "0001").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidKeyMaterial { ref field, .. } if field == "iv"
    ));
}

#[test]
fn debug_output_hides_key_bytes() {
    let decryptor = Decryptor::from_hex(KEY_HEX, IV_HEX).unwrap().unwrap();
    let rendered = format!("{decryptor:?}");

    assert!(rendered.contains("key_len: 32"));
    assert!(!rendered.contains("603deb"));
}
