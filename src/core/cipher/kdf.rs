//! Passphrase-based key derivation (Argon2id).

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{CipherError, Result};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Highest costs accepted from a stored envelope header (1 GiB, 64 passes,
    /// 16 lanes).
    pub const MAX: Self = Self {
        memory_kib: 1024 * 1024,
        iterations: 64,
        parallelism: 16,
    };

    /// True if no cost exceeds the matching one in `limit`.
    pub fn is_within(&self, limit: &Self) -> bool {
        self.memory_kib <= limit.memory_kib
            && self.iterations <= limit.iterations
            && self.parallelism <= limit.parallelism
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// A key derived from a passphrase, with the salt and parameters that
/// produced it.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    salt: Vec<u8>,
    params: KdfParams,
}

impl DerivedKey {
    /// Derive a key from `passphrase` and `salt`.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::KeyDerivation` if the parameters or salt are
    /// rejected by Argon2.
    pub fn derive(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<Self> {
        debug!(
            memory_kib = params.memory_kib,
            iterations = params.iterations,
            parallelism = params.parallelism,
            "deriving key"
        );

        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CipherError::KeyDerivation(format!("argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut bytes[..])
            .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            bytes,
            salt: salt.to_vec(),
            params,
        })
    }

    /// Rebuild a previously derived key from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::KeyDerivation` if `bytes` is not `KEY_LEN` long.
    pub fn from_parts(bytes: &[u8], salt: Vec<u8>, params: KdfParams) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        if bytes.len() != KEY_LEN {
            return Err(CipherError::KeyDerivation(format!(
                "expected {} key bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
            .into());
        }
        key.copy_from_slice(bytes);
        Ok(Self {
            bytes: key,
            salt,
            params,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// True if this key was derived with `salt` and `params`.
    pub fn matches(&self, salt: &[u8], params: KdfParams) -> bool {
        self.salt == salt && self.params == params
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[redacted]")
            .field("salt_len", &self.salt.len())
            .field("params", &self.params)
            .finish()
    }
}

/// Fresh random salt.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
