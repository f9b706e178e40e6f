//! Field-set backed provider, backend and recipe configurations.

use serde_json::value::RawValue;

use super::{CloudBackend, CloudProvider, Configurable, FieldSet, Recipe};
use crate::core::types::BackendType;
use crate::error::Result;

/// Default field holding a recipe deployment's display name.
const DEPLOYMENT_NAME_FIELD: &str = "name";

/// A provider whose configuration is a flat set of named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    name: String,
    fields: FieldSet,
}

impl ProviderConfig {
    pub fn new(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: FieldSet::new(name, fields.iter().copied()),
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

impl Configurable for ProviderConfig {
    fn load(&mut self, raw: &RawValue) -> Result<()> {
        self.fields.merge(raw)
    }

    fn save(&self) -> Result<Box<RawValue>> {
        self.fields.encode()
    }

    fn get_value(&self, field: &str) -> Result<Option<String>> {
        Ok(self.fields.get(field)?.map(str::to_string))
    }

    fn set_value(&mut self, field: &str, value: &str) -> Result<()> {
        self.fields.set(field, value)
    }
}

impl CloudProvider for ProviderConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn copy(&self) -> Result<Box<dyn CloudProvider>> {
        Ok(Box::new(self.clone()))
    }
}

/// A backend whose configuration is a flat set of named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    name: String,
    fields: FieldSet,
}

impl BackendConfig {
    pub fn new(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: FieldSet::new(name, fields.iter().copied()),
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

impl Configurable for BackendConfig {
    fn load(&mut self, raw: &RawValue) -> Result<()> {
        self.fields.merge(raw)
    }

    fn save(&self) -> Result<Box<RawValue>> {
        self.fields.encode()
    }

    fn get_value(&self, field: &str) -> Result<Option<String>> {
        Ok(self.fields.get(field)?.map(str::to_string))
    }

    fn set_value(&mut self, field: &str, value: &str) -> Result<()> {
        self.fields.set(field, value)
    }
}

impl CloudBackend for BackendConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn copy(&self) -> Result<Box<dyn CloudBackend>> {
        Ok(Box::new(self.clone()))
    }
}

/// A recipe whose inputs are a flat set of named fields.
///
/// Key fields are listed in order; their values follow the recipe name and
/// IaaS in a target's key. The deployment name is read from the `name` field
/// unless another field is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeConfig {
    name: String,
    iaas: String,
    backend_type: Option<BackendType>,
    key_fields: Vec<String>,
    deployment_field: String,
    fields: FieldSet,
}

impl RecipeConfig {
    pub fn new(name: &str, iaas: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            iaas: iaas.to_string(),
            backend_type: None,
            key_fields: Vec::new(),
            deployment_field: DEPLOYMENT_NAME_FIELD.to_string(),
            fields: FieldSet::new(&format!("{}/{}", name, iaas), fields.iter().copied()),
        }
    }

    /// Persist state through the named backend type.
    pub fn with_backend(mut self, backend_type: &str) -> Self {
        self.backend_type = Some(backend_type.to_string());
        self
    }

    /// Fields whose values form the recipe-specific part of a target key.
    pub fn with_key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Field holding the deployment display name.
    pub fn with_deployment_field(mut self, field: &str) -> Self {
        self.deployment_field = field.to_string();
        self
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

impl Configurable for RecipeConfig {
    fn load(&mut self, raw: &RawValue) -> Result<()> {
        self.fields.merge(raw)
    }

    fn save(&self) -> Result<Box<RawValue>> {
        self.fields.encode()
    }

    fn get_value(&self, field: &str) -> Result<Option<String>> {
        Ok(self.fields.get(field)?.map(str::to_string))
    }

    fn set_value(&mut self, field: &str, value: &str) -> Result<()> {
        self.fields.set(field, value)
    }
}

impl Recipe for RecipeConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn iaas(&self) -> &str {
        &self.iaas
    }

    fn backend_type(&self) -> Option<&str> {
        self.backend_type.as_deref()
    }

    fn key_values(&self) -> Vec<String> {
        self.key_fields
            .iter()
            .map(|f| self.fields.value_or_empty(f))
            .collect()
    }

    fn deployment_name(&self) -> String {
        self.fields.value_or_empty(&self.deployment_field)
    }

    fn copy(&self) -> Result<Box<dyn Recipe>> {
        Ok(Box::new(self.clone()))
    }
}
