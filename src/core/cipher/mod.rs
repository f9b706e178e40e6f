//! Authenticated encryption of the configuration store.
//!
//! AES-256-GCM under a key derived from the user's passphrase with Argon2id.
//! The encrypted file is a JSON `Envelope` carrying the KDF parameters,
//! salt, nonce and ciphertext.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CipherError, Result};

mod envelope;
mod kdf;

pub use envelope::{Envelope, KdfHeader, ENVELOPE_V1};
pub use kdf::{generate_salt, DerivedKey, KdfParams, KEY_LEN, SALT_LEN};

/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// `aad` is authenticated but not encrypted.
///
/// # Errors
///
/// Returns `CipherError::EncryptionFailed` if the cipher rejects the input.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8], aad: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
    Ok((nonce, ciphertext))
}

/// Decrypt and authenticate `ciphertext`.
///
/// # Errors
///
/// Returns `CipherError::AuthenticationFailed` for a wrong key, a modified
/// ciphertext or mismatched `aad`, and `CipherError::InvalidEnvelope` for a
/// malformed nonce.
pub fn decrypt(
    key: &DerivedKey,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN {
        return Err(CipherError::InvalidEnvelope(format!(
            "nonce must be {} bytes, got {}",
            NONCE_LEN,
            nonce.len()
        ))
        .into());
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CipherError::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}
