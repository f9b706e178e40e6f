use thiserror::Error;

/// Top-level error for all configuration store operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when a wrong passphrase or tampered file caused the failure.
    ///
    /// Callers use this to decide whether to prompt again.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::Cipher(CipherError::AuthenticationFailed))
    }
}

/// Errors raised while decoding, encoding or querying the configuration context.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document violates the configuration schema.
    #[error("invalid configuration: {0}")]
    Schema(#[source] serde_json::Error),

    /// A named provider, backend or target is not present.
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("recipe '{recipe}' for iaas '{iaas}' does not exist")]
    RecipeNotFound { recipe: String, iaas: String },

    /// A field-set payload or accessor referenced an undeclared field.
    #[error("'{owner}' has no field named '{field}'")]
    UnknownField { owner: String, field: String },

    /// Field payload has the wrong JSON shape.
    #[error("invalid value for '{owner}': {reason}")]
    InvalidValue { owner: String, reason: String },

    /// A configurable could not be copied.
    #[error("failed to copy '{0}': {1}")]
    CopyFailed(String, String),

    #[error("settings parse error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("settings serialize error: {0}")]
    SettingsSerialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ConfigError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Errors from key derivation and authenticated encryption.
#[derive(Error, Debug)]
pub enum CipherError {
    /// Wrong passphrase, or the ciphertext was modified.
    #[error("message authentication failed")]
    AuthenticationFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid encrypted envelope: {0}")]
    InvalidEnvelope(String),
}

/// Errors from the file store and its key cache.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read store file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("failed to write store file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("invalid key cache '{path}': {reason}")]
    InvalidKeyCache { path: String, reason: String },

    #[error("insecure permissions on {path}: expected {expected}, got {actual}")]
    InsecurePermissions {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("store path '{0}' is a directory")]
    IsDirectory(String),

    #[error("passphrase prompt failed: {0}")]
    Prompt(String),

    #[error("unable to determine home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, Error>;
