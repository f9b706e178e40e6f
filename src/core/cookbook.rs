//! The cookbook: packaged recipes by name and IaaS.
//!
//! Recipes are supplied by the packaging pipeline; the configuration document
//! only carries the inputs users entered for them. The `recipes` section is
//! shaped `{"<recipe>": {"<iaas>": <recipe object>}}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{DeserializeSeed, MapAccess, Visitor};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use tracing::{trace, warn};

use crate::core::cloud::{Configurable, InPlace, Recipe};
use crate::core::types::{IaasName, RecipeName};
use crate::error::Result;

/// Recipes indexed by name, then IaaS.
#[derive(Debug, Default)]
pub struct Cookbook {
    timestamp: String,
    recipes: BTreeMap<RecipeName, BTreeMap<IaasName, Box<dyn Recipe>>>,
}

impl Cookbook {
    /// Create an empty cookbook built at `timestamp`.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            recipes: BTreeMap::new(),
        }
    }

    /// Create a cookbook holding `recipes`.
    pub fn with_recipes<I>(timestamp: impl Into<String>, recipes: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Recipe>>,
    {
        let mut cookbook = Self::new(timestamp);
        for recipe in recipes {
            cookbook.set_recipe(recipe);
        }
        cookbook
    }

    /// Build timestamp of the packaged cookbook.
    ///
    /// Targets record it so a later cookbook can detect stale deployments.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn get_recipe(&self, name: &str, iaas: &str) -> Option<&dyn Recipe> {
        self.recipes
            .get(name)
            .and_then(|by_iaas| by_iaas.get(iaas))
            .map(|r| r.as_ref())
    }

    /// Insert or replace a recipe, keyed by its own name and IaaS.
    pub fn set_recipe(&mut self, recipe: Box<dyn Recipe>) {
        self.recipes
            .entry(recipe.name().to_string())
            .or_default()
            .insert(recipe.iaas().to_string(), recipe);
    }

    /// All recipes ordered by name, then IaaS.
    pub fn recipes(&self) -> impl Iterator<Item = &dyn Recipe> {
        self.recipes
            .values()
            .flat_map(|by_iaas| by_iaas.values())
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.recipes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep copy of every recipe.
    ///
    /// # Errors
    ///
    /// Returns the first recipe copy failure.
    pub fn copy(&self) -> Result<Self> {
        let mut copy = Self::new(self.timestamp.clone());
        for recipe in self.recipes() {
            copy.set_recipe(recipe.copy()?);
        }
        Ok(copy)
    }

    /// Seed that decodes a `recipes` document into this cookbook.
    pub(crate) fn seed(&mut self) -> CookbookSeed<'_> {
        CookbookSeed { cookbook: self }
    }
}

impl Serialize for Cookbook {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.recipes.len()))?;
        for (name, by_iaas) in &self.recipes {
            map.serialize_entry(name, &IaasEntries(by_iaas))?;
        }
        map.end()
    }
}

struct IaasEntries<'a>(&'a BTreeMap<IaasName, Box<dyn Recipe>>);

impl Serialize for IaasEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (iaas, recipe) in self.0 {
            let encoded = recipe.save().map_err(S::Error::custom)?;
            map.serialize_entry(iaas, &encoded)?;
        }
        map.end()
    }
}

pub(crate) struct CookbookSeed<'a> {
    cookbook: &'a mut Cookbook,
}

impl<'de> DeserializeSeed<'de> for CookbookSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for CookbookSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of recipe names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        while let Some(name) = map.next_key::<String>()? {
            map.next_value_seed(RecipeSeed {
                name: &name,
                cookbook: &mut *self.cookbook,
            })?;
        }
        Ok(())
    }
}

struct RecipeSeed<'a> {
    name: &'a str,
    cookbook: &'a mut Cookbook,
}

impl<'de> DeserializeSeed<'de> for RecipeSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RecipeSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map of iaas names for recipe '{}'", self.name)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        while let Some(iaas) = map.next_key::<String>()? {
            let recipe = self
                .cookbook
                .recipes
                .get_mut(self.name)
                .and_then(|by_iaas| by_iaas.get_mut(&iaas));

            match recipe {
                Some(recipe) => {
                    trace!(recipe = %self.name, iaas = %iaas, "decoding recipe");
                    map.next_value_seed(InPlace(recipe.as_mut()))?;
                }
                None => {
                    warn!(recipe = %self.name, iaas = %iaas, "skipping recipe not in cookbook");
                    map.next_value::<Box<RawValue>>()?;
                }
            }
        }
        Ok(())
    }
}
