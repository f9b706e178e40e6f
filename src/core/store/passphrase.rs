//! Sources of the store passphrase.

use std::io::{self, BufRead, IsTerminal};

use dialoguer::Password;
use zeroize::Zeroizing;

use crate::error::{Result, StoreError};

/// Supplies the passphrase when the store needs to derive a key.
///
/// Called lazily: only when no usable cached key exists.
pub trait PassphraseSource {
    /// # Errors
    ///
    /// Returns `StoreError::Prompt` if the passphrase can't be obtained.
    fn passphrase(&self) -> Result<Zeroizing<String>>;
}

impl<F> PassphraseSource for F
where
    F: Fn() -> String,
{
    fn passphrase(&self) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(self()))
    }
}

/// Reads the passphrase from the terminal without echo.
///
/// When stdin is not a terminal the first line of stdin is used instead.
#[derive(Debug, Clone)]
pub struct Prompt {
    message: String,
    confirm: bool,
}

impl Prompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            confirm: false,
        }
    }

    /// Ask twice and require both entries to match.
    pub fn with_confirmation(mut self) -> Self {
        self.confirm = true;
        self
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new("Configuration passphrase")
    }
}

impl PassphraseSource for Prompt {
    fn passphrase(&self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            let mut line = Zeroizing::new(String::new());
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| StoreError::Prompt(e.to_string()))?;
            return Ok(Zeroizing::new(line.trim_end_matches(&['\r', '\n'][..]).to_string()));
        }

        let mut input = Password::new()
            .with_prompt(self.message.as_str())
            .allow_empty_password(true);
        if self.confirm {
            input = input.with_confirmation("Confirm passphrase", "passphrases do not match");
        }
        let passphrase = input
            .interact()
            .map_err(|e| StoreError::Prompt(e.to_string()))?;
        Ok(Zeroizing::new(passphrase))
    }
}
