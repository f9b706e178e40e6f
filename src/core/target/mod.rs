//! Deployment targets.
//!
//! A target is one realized deployment of a recipe against a provider and,
//! when the recipe needs one, a backend. Targets are manufactured by a
//! `TargetFactory` so that their recipe, provider and backend carry the
//! right concrete types.

use std::collections::BTreeMap;

use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};

use crate::core::cloud::{CloudBackend, CloudProvider, Configurable, Recipe};
use crate::core::types::TargetKey;
use crate::error::Result;

mod set;

pub use set::{TargetFactory, TargetSet, TargetSetSeed};

/// A single output value recorded after a deployment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type", default)]
    pub kind: serde_json::Value,
    pub value: serde_json::Value,
}

impl Output {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            sensitive: false,
            kind: serde_json::Value::String("string".to_string()),
            value: value.into(),
        }
    }
}

/// One deployment's state.
#[derive(Debug)]
pub struct Target {
    recipe_name: String,
    recipe_iaas: String,

    pub recipe: Box<dyn Recipe>,
    pub provider: Box<dyn CloudProvider>,
    pub backend: Option<Box<dyn CloudBackend>>,

    /// Outputs of the last deployment run, absent until one completes.
    pub output: Option<BTreeMap<String, Output>>,

    pub cookbook_timestamp: String,
}

impl Target {
    /// Assemble a target from resolved copies.
    ///
    /// Callers outside a `TargetFactory` should go through
    /// `Context::new_target`, which resolves the copies for them.
    pub fn new(
        recipe: Box<dyn Recipe>,
        provider: Box<dyn CloudProvider>,
        backend: Option<Box<dyn CloudBackend>>,
    ) -> Self {
        Self {
            recipe_name: recipe.name().to_string(),
            recipe_iaas: recipe.iaas().to_string(),
            recipe,
            provider,
            backend,
            output: None,
            cookbook_timestamp: String::new(),
        }
    }

    pub fn recipe_name(&self) -> &str {
        &self.recipe_name
    }

    pub fn recipe_iaas(&self) -> &str {
        &self.recipe_iaas
    }

    /// Composite key: `recipe/iaas/<recipe key values joined by '/'>`.
    ///
    /// Derived from current field values, so it changes when key fields do.
    pub fn key(&self) -> TargetKey {
        let mut key = format!("{}/{}/", self.recipe_name, self.recipe_iaas);
        key.push_str(&self.recipe.key_values().join("/"));
        key
    }

    pub fn deployment_name(&self) -> String {
        self.recipe.deployment_name()
    }

    pub fn has_output(&self) -> bool {
        self.output.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// Deep copy with independent recipe, provider and backend.
    ///
    /// # Errors
    ///
    /// Propagates the first copy failure of a sub-configuration.
    pub fn copy(&self) -> Result<Self> {
        Ok(Self {
            recipe_name: self.recipe_name.clone(),
            recipe_iaas: self.recipe_iaas.clone(),
            recipe: self.recipe.copy()?,
            provider: self.provider.copy()?,
            backend: self.backend.as_ref().map(|b| b.copy()).transpose()?,
            output: self.output.clone(),
            cookbook_timestamp: self.cookbook_timestamp.clone(),
        })
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let recipe = self.recipe.save().map_err(S::Error::custom)?;
        let provider = self.provider.save().map_err(S::Error::custom)?;
        let backend = match &self.backend {
            Some(b) => Some(b.save().map_err(S::Error::custom)?),
            None => None,
        };

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("recipeName", &self.recipe_name)?;
        map.serialize_entry("recipeIaas", &self.recipe_iaas)?;
        map.serialize_entry("recipe", &recipe)?;
        map.serialize_entry("provider", &provider)?;
        map.serialize_entry("backend", &backend)?;
        if let Some(output) = &self.output {
            map.serialize_entry("output", output)?;
        }
        map.serialize_entry("cookbook_timestamp", &self.cookbook_timestamp)?;
        map.end()
    }
}
