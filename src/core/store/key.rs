//! Derived key cache with a time-to-live.
//!
//! With a timeout set, the key is also written beside the store as
//! `<store path>.key` so later processes can open the store without asking
//! for the passphrase until the timeout runs out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::fs;
use crate::core::cipher::{DerivedKey, KdfParams};
use crate::core::constants::KEY_CACHE_SUFFIX;
use crate::error::{Result, StoreError};

/// A derived key and when it was derived.
#[derive(Debug, Clone)]
pub struct CachedKey {
    key: DerivedKey,
    derived_at: DateTime<Utc>,
    timeout: Option<Duration>,
}

impl CachedKey {
    /// Cache `key` as derived now.
    pub fn new(key: DerivedKey, timeout: Option<Duration>) -> Self {
        Self {
            key,
            derived_at: Utc::now(),
            timeout,
        }
    }

    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    pub fn derived_at(&self) -> DateTime<Utc> {
        self.derived_at
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Whether the key may still be used at `now`.
    ///
    /// Without a timeout the key never expires. A derivation time in the
    /// future counts as expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let Some(timeout) = self.timeout else {
            return true;
        };
        match now.signed_duration_since(self.derived_at).to_std() {
            Ok(elapsed) => elapsed <= timeout,
            Err(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Key cache file for the store at `store_path`.
pub fn cache_path(store_path: &Path) -> PathBuf {
    let mut path = store_path.as_os_str().to_owned();
    path.push(KEY_CACHE_SUFFIX);
    PathBuf::from(path)
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    key: String,
    salt: String,
    kdf: KdfParams,
    derived_at: DateTime<Utc>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Persist `cached` to `path` with owner-only permissions.
pub(crate) fn write(path: &Path, cached: &CachedKey) -> Result<()> {
    let record = KeyRecord {
        key: STANDARD.encode(cached.key.as_bytes()),
        salt: STANDARD.encode(cached.key.salt()),
        kdf: cached.key.params(),
        derived_at: cached.derived_at,
        timeout_ms: cached
            .timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
    };
    let bytes = Zeroizing::new(serde_json::to_vec(&record)?);
    fs::write_atomic(path, &bytes)?;

    debug!(path = %path.display(), "wrote key cache");
    Ok(())
}

/// Read a key cache file, or `None` if there is none.
pub(crate) fn read(path: &Path) -> Result<Option<CachedKey>> {
    let Some(bytes) = fs::read_optional(path)? else {
        return Ok(None);
    };
    let bytes = Zeroizing::new(bytes);

    #[cfg(unix)]
    {
        if let Err(e) = fs::validate_file_permissions(path) {
            warn!(error = %e, "key cache is readable by others");
        }
    }

    let invalid = |reason: String| StoreError::InvalidKeyCache {
        path: path.display().to_string(),
        reason,
    };

    let record: KeyRecord =
        serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
    let key_bytes = Zeroizing::new(
        STANDARD
            .decode(&record.key)
            .map_err(|e| invalid(format!("key: {}", e)))?,
    );
    let salt = STANDARD
        .decode(&record.salt)
        .map_err(|e| invalid(format!("salt: {}", e)))?;
    let key = DerivedKey::from_parts(&key_bytes, salt, record.kdf)
        .map_err(|e| invalid(e.to_string()))?;

    Ok(Some(CachedKey {
        key,
        derived_at: record.derived_at,
        timeout: record.timeout_ms.map(Duration::from_millis),
    }))
}

/// Delete the key cache file if present.
pub(crate) fn remove(path: &Path) -> Result<()> {
    fs::remove_optional(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cipher::SALT_LEN;
    use tempfile::TempDir;

    fn key() -> DerivedKey {
        let params = KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        };
        DerivedKey::derive("pw", &[1u8; SALT_LEN], params).unwrap()
    }

    #[test]
    fn test_no_timeout_never_expires() {
        let cached = CachedKey::new(key(), None);
        let later = cached.derived_at() + chrono::Duration::days(365);
        assert!(cached.is_valid_at(later));
    }

    #[test]
    fn test_timeout_boundary() {
        let cached = CachedKey::new(key(), Some(Duration::from_secs(60)));
        let at = cached.derived_at();

        assert!(cached.is_valid_at(at + chrono::Duration::seconds(60)));
        assert!(!cached.is_valid_at(at + chrono::Duration::seconds(61)));
        assert!(!cached.is_valid_at(at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_cache_path_appends_suffix() {
        assert_eq!(
            cache_path(Path::new("/home/u/.cb/config")),
            PathBuf::from("/home/u/.cb/config.key")
        );
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.key");
        let cached = CachedKey::new(key(), Some(Duration::from_millis(1500)));

        write(&path, &cached).unwrap();
        let restored = read(&path).unwrap().unwrap();

        assert_eq!(restored.key().as_bytes(), cached.key().as_bytes());
        assert_eq!(restored.key().salt(), cached.key().salt());
        assert_eq!(restored.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(restored.derived_at(), cached.derived_at());
    }

    #[test]
    fn test_read_missing_and_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.key");
        assert!(read(&path).unwrap().is_none());

        std::fs::write(&path, b"{not json").unwrap();
        let err = read(&path).unwrap_err();
        assert!(err.to_string().contains("invalid key cache"));

        remove(&path).unwrap();
        assert!(!path.exists());
    }
}
