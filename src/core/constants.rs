//! Constants used throughout cloud-builder.
//!
//! Centralizes file names and environment variable names.

/// Configuration directory relative to HOME (~/.cb).
pub const CONFIG_DIR: &str = ".cb";

/// Encrypted configuration store file name inside `CONFIG_DIR`.
pub const STORE_FILE: &str = "config";

/// Settings file name inside `CONFIG_DIR`.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Suffix appended to the store path for the cached key file.
pub const KEY_CACHE_SUFFIX: &str = ".key";

/// Environment variable overriding the store path.
pub const ENV_CONFIG: &str = "CB_CONFIG";

/// Environment variable holding the log filter directive.
pub const ENV_LOG: &str = "CB_LOG";

/// File mode for the store and key cache (Unix only).
pub const SECRET_FILE_MODE: u32 = 0o600;
