//! Encrypted file store for a configuration context.
//!
//! A `FileStore` binds a `Context` to a file. The file holds either an
//! encrypted `Envelope` or, when the passphrase is empty, the plaintext
//! document.
//!
//! Keys are derived from the passphrase with Argon2id and cached. Without a
//! key timeout the cache lasts as long as the store. With one, the key is
//! also written to `<path>.key` and shared with other stores on the same
//! path until it expires.
//!
//! ## Example
//!
//! ```ignore
//! let mut store = FileStore::init(path, context, Prompt::default())?;
//! store.set_key_timeout(Some(Duration::from_secs(900)))?;
//! store.load()?;
//! store.context_mut().save_cloud_provider(provider);
//! store.save()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::core::cipher::{generate_salt, DerivedKey, Envelope, KdfParams};
use crate::core::context::Context;
use crate::core::settings::Settings;
use crate::error::{Result, StoreError};

mod fs;
pub mod key;
mod passphrase;

pub use key::CachedKey;
pub use passphrase::{PassphraseSource, Prompt};

/// A configuration context persisted to one file.
pub struct FileStore {
    path: PathBuf,
    context: Context,
    source: Box<dyn PassphraseSource>,
    key: Option<CachedKey>,
    passphrase: Option<Zeroizing<String>>,
    timeout: Option<Duration>,
    kdf: KdfParams,
    plaintext: bool,
    sealed: bool,
}

impl FileStore {
    /// Bind `context` to the file at `path`.
    ///
    /// Nothing is read until `load`. `source` is only asked for a passphrase
    /// when no usable key is cached.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IsDirectory` if `path` names a directory.
    pub fn init<S>(path: impl Into<PathBuf>, context: Context, source: S) -> Result<Self>
    where
        S: PassphraseSource + 'static,
    {
        let path = path.into();
        if path.is_dir() {
            return Err(StoreError::IsDirectory(path.display().to_string()).into());
        }
        debug!(path = %path.display(), "initialized store");

        Ok(Self {
            path,
            context,
            source: Box::new(source),
            key: None,
            passphrase: None,
            timeout: None,
            kdf: KdfParams::default(),
            plaintext: false,
            sealed: false,
        })
    }

    /// Bind `context` to the store described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoHomeDir` if no store path can be resolved.
    pub fn from_settings<S>(settings: &Settings, context: Context, source: S) -> Result<Self>
    where
        S: PassphraseSource + 'static,
    {
        let mut store = Self::init(settings.store_path()?, context, source)?;
        store.timeout = settings.key_timeout();
        store.kdf = settings.kdf;
        Ok(store)
    }

    /// Argon2id parameters for newly derived keys.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf = params;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn key_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether saves are written without encryption.
    pub fn is_plaintext(&self) -> bool {
        self.plaintext
    }

    /// Whether a usable key is cached, in memory or in the key cache file.
    ///
    /// When true, `load` and `save` won't ask for the passphrase.
    pub fn has_passphrase(&self) -> bool {
        if self.key.as_ref().is_some_and(CachedKey::is_valid) {
            return true;
        }
        matches!(
            key::read(&key::cache_path(&self.path)),
            Ok(Some(cached)) if cached.is_valid()
        )
    }

    /// Use `passphrase` for the next save.
    ///
    /// A non-empty passphrase derives a new key with a fresh salt and is kept
    /// for as long as that key is valid, so `load` can open a file written
    /// with another salt without asking. An empty one switches the store to
    /// plaintext and drops any cached key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::KeyDerivation` if derivation fails, or a
    /// `StoreError` if the key cache file can't be updated.
    pub fn set_passphrase(&mut self, passphrase: &str) -> Result<()> {
        if passphrase.is_empty() {
            info!("passphrase cleared, store will be saved unencrypted");
            self.plaintext = true;
            self.sealed = false;
            self.key = None;
            self.passphrase = None;
            return key::remove(&key::cache_path(&self.path));
        }

        let key = DerivedKey::derive(passphrase, &generate_salt(), self.kdf)?;
        self.plaintext = false;
        self.passphrase = Some(Zeroizing::new(passphrase.to_string()));
        self.remember(key)
    }

    /// How long a derived key stays usable; `None` keeps it for the life of
    /// this store only.
    ///
    /// Applies to the key already held, measured from when it was derived.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the key cache file can't be updated.
    pub fn set_key_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        debug!(timeout = ?timeout, "setting key timeout");
        self.timeout = timeout;

        let cache = key::cache_path(&self.path);
        match (&mut self.key, timeout) {
            (Some(cached), Some(_)) => {
                cached.set_timeout(timeout);
                key::write(&cache, cached)
            }
            (Some(cached), None) => {
                cached.set_timeout(None);
                key::remove(&cache)
            }
            (None, None) => key::remove(&cache),
            (None, Some(_)) => Ok(()),
        }
    }

    /// Read and decrypt the file into the context.
    ///
    /// A missing file is a fresh store and leaves the context as is.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::AuthenticationFailed` for a wrong passphrase or
    /// a damaged or modified file, in which case the context is unchanged.
    /// Decode failures are returned from `Context::load`.
    ///
    /// A plaintext file loaded into a store that holds a key, or that last
    /// read or wrote an encrypted file, does not switch it to plaintext.
    pub fn load(&mut self) -> Result<()> {
        let Some(bytes) = fs::read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "store file does not exist");
            return Ok(());
        };
        let bytes = Zeroizing::new(bytes);

        match Envelope::parse(&bytes)? {
            Some(envelope) => {
                let document = self.open(&envelope)?;
                self.context.load(document.as_slice())?;
                self.plaintext = false;
                self.sealed = true;
            }
            None => {
                self.context.load(bytes.as_slice())?;
                if self.sealed || self.key.is_some() {
                    warn!(
                        path = %self.path.display(),
                        "store file is not encrypted, next save will encrypt it"
                    );
                } else {
                    debug!(path = %self.path.display(), "store file is not encrypted");
                    self.plaintext = true;
                }
            }
        }

        debug!(path = %self.path.display(), "store loaded");
        Ok(())
    }

    /// Encode the context and write it to the file.
    ///
    /// # Errors
    ///
    /// Returns encode, encryption or `StoreError::WriteFailed` errors. The
    /// file is replaced atomically, so it is never left half-written.
    pub fn save(&mut self) -> Result<()> {
        let mut document = Zeroizing::new(Vec::new());
        self.context.save(&mut *document)?;

        let key = self.encryption_key()?;
        let contents = match &key {
            Some(key) => Envelope::seal(key, &document)?.to_bytes()?,
            None => document.to_vec(),
        };
        fs::write_atomic(&self.path, &contents)?;
        self.sealed = key.is_some();

        debug!(
            path = %self.path.display(),
            encrypted = !self.plaintext,
            "store saved"
        );
        Ok(())
    }

    /// Decrypt `envelope`, preferring a cached key, then the installed
    /// passphrase, over asking.
    fn open(&mut self, envelope: &Envelope) -> Result<Zeroizing<Vec<u8>>> {
        let salt = envelope.salt()?;
        let params = envelope.params();

        if let Some(key) = self.cached_key() {
            if key.matches(&salt, params) {
                if let Some(document) = try_open(envelope, &key)? {
                    return Ok(document);
                }
                warn!("cached key rejected, asking for passphrase");
            }
        }

        if let Some(passphrase) = self.passphrase.clone() {
            let key = DerivedKey::derive(&passphrase, &salt, params)?;
            if let Some(document) = try_open(envelope, &key)? {
                self.remember(key)?;
                return Ok(document);
            }
            warn!("installed passphrase rejected, asking for passphrase");
        }

        let passphrase = self.source.passphrase()?;
        let key = DerivedKey::derive(&passphrase, &salt, params)?;
        let document = envelope.open(&key)?;
        self.remember(key)?;
        Ok(document)
    }

    /// Key for the next save, or `None` to write plaintext.
    ///
    /// A passphrase asked for here must open the envelope already on disk,
    /// and the new key reuses its salt.
    fn encryption_key(&mut self) -> Result<Option<DerivedKey>> {
        if self.plaintext {
            return Ok(None);
        }
        if let Some(key) = self.cached_key() {
            return Ok(Some(key));
        }

        let stored = match fs::read_optional(&self.path)? {
            Some(bytes) => Envelope::parse(&Zeroizing::new(bytes))?,
            None => None,
        };
        let passphrase = self.source.passphrase()?;

        let key = match stored {
            Some(envelope) => {
                let key = DerivedKey::derive(&passphrase, &envelope.salt()?, envelope.params())?;
                envelope.open(&key)?;
                debug!(path = %self.path.display(), "passphrase verified against store file");
                key
            }
            None if passphrase.is_empty() => {
                info!("empty passphrase, saving unencrypted");
                self.plaintext = true;
                return Ok(None);
            }
            None => DerivedKey::derive(&passphrase, &generate_salt(), self.kdf)?,
        };
        self.remember(key.clone())?;
        Ok(Some(key))
    }

    /// A usable cached key, adopting the key cache file if memory has none.
    ///
    /// An expired key cache file is deleted. An adopted key keeps the shorter
    /// of this store's timeout and the file's.
    fn cached_key(&mut self) -> Option<DerivedKey> {
        if let Some(cached) = &self.key {
            if cached.is_valid() {
                return Some(cached.key().clone());
            }
            debug!(derived_at = %cached.derived_at(), "cached key expired");
            self.passphrase = None;
        }

        let cache = key::cache_path(&self.path);
        let mut cached = match key::read(&cache) {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable key cache");
                return None;
            }
        };
        if !cached.is_valid() {
            debug!(path = %cache.display(), "key cache file expired, removing");
            if let Err(e) = key::remove(&cache) {
                warn!(error = %e, "failed to remove expired key cache");
            }
            return None;
        }

        let timeout = shorter(self.timeout, cached.timeout());
        cached.set_timeout(timeout);
        if !cached.is_valid() {
            return None;
        }

        debug!(path = %cache.display(), "using key cache file");
        let key = cached.key().clone();
        self.timeout = timeout;
        self.key = Some(cached);
        Some(key)
    }

    /// Cache a freshly derived key, and persist it when a timeout is set.
    fn remember(&mut self, key: DerivedKey) -> Result<()> {
        let cached = CachedKey::new(key, self.timeout);
        if self.timeout.is_some() {
            key::write(&key::cache_path(&self.path), &cached)?;
        }
        self.key = Some(cached);
        Ok(())
    }
}

/// Open `envelope` with `key`, or `None` if the key is rejected.
fn try_open(envelope: &Envelope, key: &DerivedKey) -> Result<Option<Zeroizing<Vec<u8>>>> {
    match envelope.open(key) {
        Ok(document) => Ok(Some(document)),
        Err(e) if e.is_authentication_failure() => Ok(None),
        Err(e) => Err(e),
    }
}

fn shorter(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("context", &self.context)
            .field("key", &self.key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[redacted]"))
            .field("timeout", &self.timeout)
            .field("kdf", &self.kdf)
            .field("plaintext", &self.plaintext)
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}
