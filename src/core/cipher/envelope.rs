//! On-disk envelope for the encrypted store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::kdf::{DerivedKey, KdfParams};
use crate::error::{CipherError, Result};

/// Current envelope format.
pub const ENVELOPE_V1: &str = "cb-store-v1";

const ENVELOPE_PREFIX: &str = "cb-store-";
const ALGORITHM: &str = "argon2id";

/// How the key was derived: everything but the passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfHeader {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    /// Base64 salt.
    pub salt: String,
}

/// Encrypted configuration document.
///
/// The version and KDF header are bound to the ciphertext as associated
/// data, so editing them breaks authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    version: String,
    kdf: KdfHeader,
    nonce: String,
    ciphertext: String,
}

#[derive(Serialize)]
struct Aad<'a> {
    version: &'a str,
    kdf: &'a KdfHeader,
}

#[derive(Deserialize)]
struct Probe {
    #[serde(default)]
    version: Option<String>,
}

impl Envelope {
    /// Encrypt `plaintext` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::EncryptionFailed` if encryption fails.
    pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<Self> {
        let params = key.params();
        let kdf = KdfHeader {
            algorithm: ALGORITHM.to_string(),
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
            salt: STANDARD.encode(key.salt()),
        };
        let version = ENVELOPE_V1.to_string();
        let aad = aad(&version, &kdf)?;

        let (nonce, ciphertext) = super::encrypt(key, plaintext, &aad)?;
        Ok(Self {
            version,
            kdf,
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        })
    }

    /// Decrypt the payload.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::AuthenticationFailed` if `key` is wrong or the
    /// envelope was modified.
    pub fn open(&self, key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>> {
        let nonce = decode("nonce", &self.nonce)?;
        let ciphertext = decode("ciphertext", &self.ciphertext)?;
        let aad = aad(&self.version, &self.kdf)?;
        super::decrypt(key, &nonce, &ciphertext, &aad)
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            CipherError::EncryptionFailed(format!("failed to serialize envelope: {}", e)).into()
        })
    }

    /// Parse file contents as an envelope.
    ///
    /// Returns `None` for anything that is not an envelope, such as a
    /// plaintext configuration document.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::AuthenticationFailed` for a damaged envelope,
    /// and `CipherError::InvalidEnvelope` for an unsupported version, key
    /// derivation or cost.
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>> {
        let version = match serde_json::from_slice::<Probe>(bytes) {
            Ok(Probe {
                version: Some(version),
            }) => version,
            Ok(Probe { version: None }) => return Ok(None),
            Err(e) if starts_like_envelope(bytes) => {
                debug!(error = %e, "envelope is damaged");
                return Err(CipherError::AuthenticationFailed.into());
            }
            Err(_) => return Ok(None),
        };
        if version != ENVELOPE_V1 {
            if version.starts_with(ENVELOPE_PREFIX) {
                return Err(CipherError::InvalidEnvelope(format!(
                    "unsupported version '{}'",
                    version
                ))
                .into());
            }
            return Ok(None);
        }

        let envelope: Self = serde_json::from_slice(bytes).map_err(|e| {
            debug!(error = %e, "envelope is damaged");
            CipherError::AuthenticationFailed
        })?;
        if envelope.kdf.algorithm != ALGORITHM {
            return Err(CipherError::InvalidEnvelope(format!(
                "unsupported key derivation '{}'",
                envelope.kdf.algorithm
            ))
            .into());
        }
        let params = envelope.params();
        if !params.is_within(&KdfParams::MAX) {
            return Err(CipherError::InvalidEnvelope(format!(
                "key derivation cost too high (memory_kib={}, iterations={}, parallelism={})",
                params.memory_kib, params.iterations, params.parallelism
            ))
            .into());
        }
        Ok(Some(envelope))
    }

    /// Check if file contents are an envelope.
    pub fn is_envelope(bytes: &[u8]) -> bool {
        matches!(Self::parse(bytes), Ok(Some(_)))
    }

    pub fn kdf(&self) -> &KdfHeader {
        &self.kdf
    }

    /// Salt the key was derived with.
    pub fn salt(&self) -> Result<Vec<u8>> {
        decode("salt", &self.kdf.salt)
    }

    /// Argon2id parameters the key was derived with.
    pub fn params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf.memory_kib,
            iterations: self.kdf.iterations,
            parallelism: self.kdf.parallelism,
        }
    }
}

fn aad(version: &str, kdf: &KdfHeader) -> Result<Vec<u8>> {
    serde_json::to_vec(&Aad { version, kdf })
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()).into())
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value).map_err(|e| {
        debug!(field, error = %e, "envelope field is damaged");
        CipherError::AuthenticationFailed.into()
    })
}

/// True if `bytes` open with a `"version"` key, as every envelope does.
fn starts_like_envelope(bytes: &[u8]) -> bool {
    let Some(rest) = skip_whitespace(bytes).strip_prefix(b"{") else {
        return false;
    };
    skip_whitespace(rest).starts_with(b"\"version\"")
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let n = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[n..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cipher::SALT_LEN;

    fn key() -> DerivedKey {
        let params = KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        };
        DerivedKey::derive("pw", &[5u8; SALT_LEN], params).unwrap()
    }

    #[test]
    fn test_seal_and_open() {
        let k = key();
        let envelope = Envelope::seal(&k, br#"{"cloud":{}}"#).unwrap();
        let bytes = envelope.to_bytes().unwrap();

        assert!(Envelope::is_envelope(&bytes));
        let parsed = Envelope::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed.salt().unwrap(), k.salt());
        assert_eq!(parsed.params(), k.params());
        assert_eq!(parsed.open(&k).unwrap().as_slice(), br#"{"cloud":{}}"#);
    }

    #[test]
    fn test_plaintext_document_is_not_envelope() {
        assert!(Envelope::parse(br#"{"cloud":{"providers":{}}}"#).unwrap().is_none());
        assert!(Envelope::parse(b"not json").unwrap().is_none());
        assert!(!Envelope::is_envelope(br#"{"version":"1.0"}"#));
    }

    #[test]
    fn test_unsupported_version() {
        let err = Envelope::parse(br#"{"version":"cb-store-v9"}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported version 'cb-store-v9'"));
    }

    #[test]
    fn test_header_is_authenticated() {
        let k = key();
        let mut envelope = Envelope::seal(&k, b"payload").unwrap();
        envelope.kdf.iterations += 1;
        assert!(envelope.open(&k).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn test_malformed_base64() {
        let k = key();
        let mut envelope = Envelope::seal(&k, b"payload").unwrap();
        envelope.nonce = "%%%".to_string();
        assert!(envelope.open(&k).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn test_truncated_envelope_fails_authentication() {
        let bytes = Envelope::seal(&key(), b"payload").unwrap().to_bytes().unwrap();
        let truncated = &bytes[..bytes.len() - 10];
        assert!(Envelope::parse(truncated).unwrap_err().is_authentication_failure());

        let err = Envelope::parse(b" { \"version\": 1 }").unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_excessive_cost_rejected() {
        let mut envelope = Envelope::seal(&key(), b"payload").unwrap();
        envelope.kdf.memory_kib = 268_435_455;
        let bytes = envelope.to_bytes().unwrap();

        let err = Envelope::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("key derivation cost too high"));
        assert!(!err.is_authentication_failure());
    }
}
