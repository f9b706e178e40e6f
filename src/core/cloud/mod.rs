//! Configurable cloud entities.
//!
//! Providers, backends and recipes are external collaborators: the store only
//! needs to name them, copy them and move their payload in and out of a raw
//! JSON document. Their concrete field layout is owned by the implementation.
//!
//! ## Adding a New Provider Type
//!
//! 1. Implement `Configurable` (decode in place, encode)
//! 2. Implement `CloudProvider` (name and copy)
//! 3. Register an instance with `Context::new`

use std::collections::BTreeMap;
use std::fmt;

use serde_json::value::RawValue;

use crate::error::Result;

mod configs;
mod fields;

pub use configs::{BackendConfig, ProviderConfig, RecipeConfig};
pub use fields::FieldSet;

/// An entity whose payload is persisted as a JSON sub-document.
pub trait Configurable: fmt::Debug {
    /// Decode a raw JSON document into this instance in place.
    ///
    /// The instance determines the accepted shape. Fields the document does
    /// not mention keep their current values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the payload does not fit this instance.
    fn load(&mut self, raw: &RawValue) -> Result<()>;

    /// Encode this instance as a raw JSON document.
    fn save(&self) -> Result<Box<RawValue>>;

    /// Current value of a named field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownField` if the field is not declared.
    fn get_value(&self, field: &str) -> Result<Option<String>>;

    /// Set a named field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownField` if the field is not declared.
    fn set_value(&mut self, field: &str, value: &str) -> Result<()>;
}

/// A cloud provider configuration (credentials, region, ...).
pub trait CloudProvider: Configurable {
    /// Provider name, which is also the IaaS name recipes refer to.
    fn name(&self) -> &str;

    /// Independent copy of this provider.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CopyFailed` if the instance cannot be duplicated.
    fn copy(&self) -> Result<Box<dyn CloudProvider>>;
}

/// A state-storage backend configuration.
pub trait CloudBackend: Configurable {
    /// Backend type name.
    fn name(&self) -> &str;

    /// Independent copy of this backend.
    fn copy(&self) -> Result<Box<dyn CloudBackend>>;
}

/// A deployment recipe bound to one IaaS.
pub trait Recipe: Configurable {
    fn name(&self) -> &str;

    fn iaas(&self) -> &str;

    /// Backend type this recipe persists state through, if any.
    fn backend_type(&self) -> Option<&str>;

    /// Recipe-specific values that, after name and IaaS, form a target's key.
    fn key_values(&self) -> Vec<String>;

    /// Display name of a deployment made from this recipe.
    fn deployment_name(&self) -> String;

    /// Independent copy of this recipe.
    fn copy(&self) -> Result<Box<dyn Recipe>>;
}

/// Registered providers by name.
pub type Providers = BTreeMap<String, Box<dyn CloudProvider>>;

/// Registered backends by name.
pub type Backends = BTreeMap<String, Box<dyn CloudBackend>>;

/// Build a provider registry keyed by each provider's own name.
pub fn providers<I>(items: I) -> Providers
where
    I: IntoIterator<Item = Box<dyn CloudProvider>>,
{
    items
        .into_iter()
        .map(|p| (p.name().to_string(), p))
        .collect()
}

/// Build a backend registry keyed by each backend's own name.
pub fn backends<I>(items: I) -> Backends
where
    I: IntoIterator<Item = Box<dyn CloudBackend>>,
{
    items
        .into_iter()
        .map(|b| (b.name().to_string(), b))
        .collect()
}

/// Copy every provider in a registry.
pub(crate) fn copy_providers(registry: &Providers) -> Result<Providers> {
    registry
        .iter()
        .map(|(name, p)| p.copy().map(|copy| (name.clone(), copy)))
        .collect()
}

/// Copy every backend in a registry.
pub(crate) fn copy_backends(registry: &Backends) -> Result<Backends> {
    registry
        .iter()
        .map(|(name, b)| b.copy().map(|copy| (name.clone(), copy)))
        .collect()
}

/// Deserialize seed that decodes the next value into an existing instance.
///
/// The raw sub-document is captured first, then handed to the instance,
/// which alone knows its concrete shape.
pub(crate) struct InPlace<'a, T: ?Sized>(pub(crate) &'a mut T);

impl<'de, T> serde::de::DeserializeSeed<'de> for InPlace<'_, T>
where
    T: Configurable + ?Sized,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;
        use serde::Deserialize as _;

        let raw = Box::<RawValue>::deserialize(deserializer)?;
        self.0.load(&raw).map_err(D::Error::custom)
    }
}
