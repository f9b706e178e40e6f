//! User settings file management.
//!
//! Handles reading and writing `~/.cb/settings.toml`, which locates the
//! configuration store and tunes key caching and derivation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::cipher::KdfParams;
use crate::core::constants;
use crate::error::{ConfigError, Result, StoreError};

/// Settings stored in `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    /// Argon2id parameters for newly derived keys.
    pub kdf: KdfParams,
}

/// The `[store]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store file location; defaults to `~/.cb/config`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Seconds a derived key stays cached on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_timeout_secs: Option<u64>,
}

impl Settings {
    /// Configuration directory (`~/.cb`).
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(home.join(constants::CONFIG_DIR))
    }

    /// Default settings file path (`~/.cb/settings.toml`).
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(constants::SETTINGS_FILE))
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load settings from `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Settings` if the TOML is malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading settings");

        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&contents).map_err(ConfigError::Settings)?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::SettingsSerialize)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Store file path.
    ///
    /// `CB_CONFIG` takes precedence, then `[store] path`, then `~/.cb/config`.
    pub fn store_path(&self) -> Result<PathBuf> {
        self.resolve_store_path(std::env::var_os(constants::ENV_CONFIG))
    }

    fn resolve_store_path(&self, env_override: Option<OsString>) -> Result<PathBuf> {
        if let Some(path) = env_override.filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }
        Ok(Self::config_dir()?.join(constants::STORE_FILE))
    }

    /// Key cache timeout, if caching beyond the process is enabled.
    pub fn key_timeout(&self) -> Option<Duration> {
        self.store.key_timeout_secs.map(Duration::from_secs)
    }
}
