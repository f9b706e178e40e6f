//! Named field sets.
//!
//! A `FieldSet` is a fixed list of optional string fields. It is the payload
//! shape of the built-in provider, backend and recipe configurations.

use std::collections::BTreeMap;

use serde_json::value::RawValue;
use tracing::trace;

use crate::error::{ConfigError, Result};

/// Declared fields and their current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    owner: String,
    values: BTreeMap<String, Option<String>>,
}

impl FieldSet {
    /// Create a field set declaring `fields`, all unset.
    pub fn new<I, S>(owner: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.to_string(),
            values: fields.into_iter().map(|f| (f.into(), None)).collect(),
        }
    }

    /// Name used in error messages.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Declared field names, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Current value of a declared field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownField` if the field is not declared.
    pub fn get(&self, field: &str) -> Result<Option<&str>> {
        self.values
            .get(field)
            .map(Option::as_deref)
            .ok_or_else(|| self.unknown(field).into())
    }

    /// Value of a declared field, empty when unset or undeclared.
    pub fn value_or_empty(&self, field: &str) -> String {
        self.values
            .get(field)
            .and_then(Clone::clone)
            .unwrap_or_default()
    }

    /// Set a declared field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownField` if the field is not declared.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = Some(value.into());
                Ok(())
            }
            None => Err(self.unknown(field).into()),
        }
    }

    /// Unset a declared field.
    pub fn clear(&mut self, field: &str) -> Result<()> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(self.unknown(field).into()),
        }
    }

    /// Merge a JSON object of `field: string|null` into this set.
    ///
    /// Every key is checked before anything is applied, so a rejected
    /// document leaves the set unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the document is not an object of
    /// strings, or `ConfigError::UnknownField` for undeclared keys.
    pub fn merge(&mut self, raw: &RawValue) -> Result<()> {
        let incoming: BTreeMap<String, Option<String>> = serde_json::from_str(raw.get())
            .map_err(|e| ConfigError::InvalidValue {
                owner: self.owner.clone(),
                reason: e.to_string(),
            })?;

        if let Some(field) = incoming.keys().find(|f| !self.values.contains_key(*f)) {
            return Err(self.unknown(field).into());
        }

        trace!(owner = %self.owner, fields = incoming.len(), "merging fields");
        self.values.extend(incoming);
        Ok(())
    }

    /// Encode the set as a JSON object, unset fields as `null`.
    pub fn encode(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&self.values)?)
    }

    fn unknown(&self, field: &str) -> ConfigError {
        ConfigError::UnknownField {
            owner: self.owner.clone(),
            field: field.to_string(),
        }
    }
}
