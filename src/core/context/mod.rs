//! The configuration aggregate.
//!
//! A `Context` owns the registered cloud providers and backends, the cookbook
//! and every deployment target. It is the unit the store loads and saves, and
//! the factory targets are manufactured through.
//!
//! Reads hand out copies. Mutating a returned provider, recipe or target has
//! no effect until it is saved back.

use tracing::debug;

use crate::core::cloud::{self, Backends, CloudBackend, CloudProvider, Providers, Recipe};
use crate::core::cookbook::Cookbook;
use crate::core::target::{Target, TargetFactory, TargetSet};
use crate::error::{ConfigError, Result};

mod load;
mod save;

/// All configuration for one user.
#[derive(Debug, Default)]
pub struct Context {
    cookbook: Cookbook,
    providers: Providers,
    backends: Backends,
    targets: TargetSet,
}

impl Context {
    /// Create a context from a packaged cookbook and registered templates.
    ///
    /// Only providers and backends registered here can appear in a loaded
    /// document.
    pub fn new(cookbook: Cookbook, providers: Providers, backends: Backends) -> Self {
        Self {
            cookbook,
            providers,
            backends,
            targets: TargetSet::new(),
        }
    }

    pub fn cookbook(&self) -> &Cookbook {
        &self.cookbook
    }

    /// Copy of the recipe `name` for `iaas`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::RecipeNotFound` if the cookbook has no such recipe.
    pub fn get_cookbook_recipe(&self, name: &str, iaas: &str) -> Result<Box<dyn Recipe>> {
        self.resolver().recipe(name, iaas)
    }

    /// Insert or replace a recipe in the cookbook.
    pub fn save_cookbook_recipe(&mut self, recipe: Box<dyn Recipe>) {
        debug!(recipe = %recipe.name(), iaas = %recipe.iaas(), "saving recipe");
        self.cookbook.set_recipe(recipe);
    }

    /// Every registered provider, ordered by name.
    pub fn cloud_provider_templates(&self) -> Vec<&dyn CloudProvider> {
        self.providers.values().map(|p| p.as_ref()).collect()
    }

    /// Every registered backend, ordered by name.
    pub fn cloud_backends(&self) -> Vec<&dyn CloudBackend> {
        self.backends.values().map(|b| b.as_ref()).collect()
    }

    /// Copy of the provider registered for `iaas`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no provider has that name.
    pub fn get_cloud_provider(&self, iaas: &str) -> Result<Box<dyn CloudProvider>> {
        self.resolver().provider(iaas)
    }

    /// Insert or replace a provider under its own name.
    pub fn save_cloud_provider(&mut self, provider: Box<dyn CloudProvider>) {
        debug!(provider = %provider.name(), "saving cloud provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Copy of the backend registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no backend has that name.
    pub fn get_cloud_backend(&self, name: &str) -> Result<Box<dyn CloudBackend>> {
        self.resolver().backend(name)
    }

    /// Insert or replace a backend under its own name.
    pub fn save_cloud_backend(&mut self, backend: Box<dyn CloudBackend>) {
        debug!(backend = %backend.name(), "saving cloud backend");
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn target_set(&self) -> &TargetSet {
        &self.targets
    }

    pub fn target_set_mut(&mut self) -> &mut TargetSet {
        &mut self.targets
    }

    pub fn has_target(&self, key: &str) -> bool {
        self.targets.contains(key)
    }

    /// Copy of the target stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if there is no such target.
    pub fn get_target(&self, key: &str) -> Result<Target> {
        self.targets
            .get_target(key)
            .ok_or_else(|| ConfigError::not_found("target", key))?
            .copy()
    }

    /// Store `target` under its current key, replacing the entry at `old_key`.
    pub fn save_target(&mut self, old_key: &str, target: Target) {
        self.targets.save_target(old_key, target);
    }

    pub fn delete_target(&mut self, key: &str) -> Option<Target> {
        self.targets.delete_target(key)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            cookbook: &self.cookbook,
            providers: &self.providers,
            backends: &self.backends,
        }
    }

    /// Copy of the cookbook and registries with no targets, for decoding into.
    fn staged(&self) -> Result<Self> {
        Ok(Self {
            cookbook: self.cookbook.copy()?,
            providers: cloud::copy_providers(&self.providers)?,
            backends: cloud::copy_backends(&self.backends)?,
            targets: TargetSet::new(),
        })
    }
}

impl TargetFactory for Context {
    fn new_target(&self, recipe_name: &str, recipe_iaas: &str) -> Result<Target> {
        self.resolver().new_target(recipe_name, recipe_iaas)
    }
}

/// Read-only view of the parts of a context targets are built from.
///
/// Borrowing these fields separately lets the target set be decoded while
/// its siblings resolve templates.
struct Resolver<'a> {
    cookbook: &'a Cookbook,
    providers: &'a Providers,
    backends: &'a Backends,
}

impl Resolver<'_> {
    fn recipe(&self, name: &str, iaas: &str) -> Result<Box<dyn Recipe>> {
        self.cookbook
            .get_recipe(name, iaas)
            .ok_or_else(|| ConfigError::RecipeNotFound {
                recipe: name.to_string(),
                iaas: iaas.to_string(),
            })?
            .copy()
    }

    fn provider(&self, iaas: &str) -> Result<Box<dyn CloudProvider>> {
        self.providers
            .get(iaas)
            .ok_or_else(|| ConfigError::not_found("provider for iaas", iaas))?
            .copy()
    }

    fn backend(&self, name: &str) -> Result<Box<dyn CloudBackend>> {
        self.backends
            .get(name)
            .ok_or_else(|| ConfigError::not_found("backend of type", name))?
            .copy()
    }
}

impl TargetFactory for Resolver<'_> {
    fn new_target(&self, recipe_name: &str, recipe_iaas: &str) -> Result<Target> {
        let recipe = self.recipe(recipe_name, recipe_iaas)?;
        let provider = self.provider(recipe_iaas)?;
        let backend = recipe
            .backend_type()
            .map(|backend_type| self.backend(backend_type))
            .transpose()?;

        let mut target = Target::new(recipe, provider, backend);
        target.cookbook_timestamp = self.cookbook.timestamp().to_string();
        Ok(target)
    }
}
