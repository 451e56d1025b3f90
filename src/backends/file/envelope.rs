//! Versioned AES-256-GCM envelope.
//!
//! Layout: `[version:1][nonce:12][auth tag:16][ciphertext:N]`.
//! Byte 0 is the format discriminator and must stay there in every future
//! version.

use super::key::MasterKey;
use crate::{KeyringError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

/// Current (and only) envelope format version.
pub const FORMAT_VERSION: u8 = 1;

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Bytes preceding the ciphertext.
pub const HEADER_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

fn cipher(key: &MasterKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| KeyringError::Config("master key has invalid length".to_string()))
}

/// Encrypts `plaintext` under a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm appends the tag to the ciphertext
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| KeyringError::Other(anyhow::anyhow!("encryption failed")))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut envelope = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    envelope.push(FORMAT_VERSION);
    envelope.extend_from_slice(nonce.as_slice());
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(ciphertext);
    Ok(envelope)
}

/// Authenticates and decrypts an envelope.
///
/// # Errors
///
/// - [`KeyringError::UnsupportedVersion`]: byte 0 is not [`FORMAT_VERSION`]
/// - [`KeyringError::Decryption`]: envelope truncated, or the
///   authentication tag does not match (wrong key or tampering anywhere
///   in nonce, tag or ciphertext)
pub fn open(envelope: &[u8], key: &MasterKey) -> Result<Vec<u8>> {
    let (&version, rest) = envelope
        .split_first()
        .ok_or_else(|| KeyringError::Decryption("envelope is empty".to_string()))?;

    if version != FORMAT_VERSION {
        return Err(KeyringError::UnsupportedVersion(version));
    }

    if rest.len() < NONCE_LEN + TAG_LEN {
        return Err(KeyringError::Decryption("envelope is truncated".to_string()));
    }

    let (nonce, rest) = rest.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| KeyringError::Decryption("authentication tag mismatch".to_string()))
}
