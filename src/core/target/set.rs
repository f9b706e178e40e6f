//! Keyed collection of targets.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{DeserializeSeed, Error as _, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use tracing::{debug, trace, warn};

use super::{Output, Target};
use crate::core::cloud::Configurable;
use crate::core::types::TargetKey;
use crate::error::Result;

/// Manufactures correctly typed target skeletons.
///
/// This is the only thing a `TargetSet` needs from its owner, which keeps the
/// set independent of the context that holds it.
pub trait TargetFactory {
    /// Build an empty target for a recipe on an IaaS.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the recipe, provider or backend can't be resolved.
    fn new_target(&self, recipe_name: &str, recipe_iaas: &str) -> Result<Target>;
}

/// Targets indexed by their current key.
#[derive(Debug, Default)]
pub struct TargetSet {
    targets: HashMap<TargetKey, Target>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets whose key starts with `recipe/iaas/<key values>`, ordered by
    /// deployment name.
    pub fn lookup(&self, recipe_name: &str, iaas_name: &str, key_values: &[&str]) -> Vec<&Target> {
        let prefix = format!("{}/{}/{}", recipe_name, iaas_name, key_values.join("/"));
        trace!(prefix = %prefix, "looking up targets");

        let mut found: Vec<(String, &Target)> = Vec::new();
        for target in self.targets.values() {
            if !target.key().starts_with(&prefix) {
                continue;
            }
            let name = target.deployment_name();
            let at = found.partition_point(|(n, _)| *n <= name);
            found.insert(at, (name, target));
        }
        found.into_iter().map(|(_, target)| target).collect()
    }

    /// Every target, in no particular order.
    pub fn targets(&self) -> Vec<&Target> {
        self.targets.values().collect()
    }

    pub fn get_target(&self, key: &str) -> Option<&Target> {
        trace!(key = %key, "retrieving target");
        self.targets.get(key)
    }

    /// Store `target` under its current key, dropping whatever was at `old_key`.
    ///
    /// A target's key follows its field values, so the entry it was loaded
    /// from must be removed first or a stale duplicate would remain.
    pub fn save_target(&mut self, old_key: &str, target: Target) {
        let key = target.key();
        debug!(old_key = %old_key, key = %key, "saving target");

        self.targets.remove(old_key);
        self.targets.insert(key, target);
    }

    /// Remove the target at `key`, if any.
    pub fn delete_target(&mut self, key: &str) -> Option<Target> {
        debug!(key = %key, "deleting target");
        self.targets.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.targets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Deep copy of every target.
    pub fn copy(&self) -> Result<Self> {
        let targets = self
            .targets
            .iter()
            .map(|(key, t)| t.copy().map(|copy| (key.clone(), copy)))
            .collect::<Result<_>>()?;
        Ok(Self { targets })
    }

    /// Seed that decodes a serialized target array into this set.
    pub fn seed<'a, F>(&'a mut self, factory: &'a F) -> TargetSetSeed<'a, F>
    where
        F: TargetFactory + ?Sized,
    {
        TargetSetSeed {
            factory,
            targets: self,
        }
    }

    /// Decode a JSON target array into this set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the array is malformed, a target can't be
    /// built, or two targets share a key.
    pub fn unmarshal<F>(&mut self, json: &str, factory: &F) -> Result<()>
    where
        F: TargetFactory + ?Sized,
    {
        let mut de = serde_json::Deserializer::from_str(json);
        self.seed(factory).deserialize(&mut de)?;
        de.end()?;
        Ok(())
    }
}

impl Serialize for TargetSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.targets.len()))?;
        for target in self.targets.values() {
            seq.serialize_element(target)?;
        }
        seq.end()
    }
}

/// A serialized target before it's bound to a typed skeleton.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTarget {
    recipe_name: String,
    recipe_iaas: String,

    recipe: Box<RawValue>,
    provider: Box<RawValue>,
    #[serde(default)]
    backend: Option<Box<RawValue>>,

    #[serde(default)]
    output: Option<BTreeMap<String, Output>>,

    #[serde(rename = "cookbook_timestamp", default)]
    cookbook_timestamp: String,
}

/// Decodes a target array, asking `factory` for each target's skeleton.
pub struct TargetSetSeed<'a, F: ?Sized> {
    factory: &'a F,
    targets: &'a mut TargetSet,
}

impl<'de, F> DeserializeSeed<'de> for TargetSetSeed<'_, F>
where
    F: TargetFactory + ?Sized,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for TargetSetSeed<'_, F>
where
    F: TargetFactory + ?Sized,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of targets")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        while let Some(parsed) = seq.next_element::<ParsedTarget>()? {
            let target = bind(self.factory, parsed).map_err(A::Error::custom)?;
            let key = target.key();
            if self.targets.targets.contains_key(&key) {
                return Err(A::Error::custom(format!("duplicate target '{}'", key)));
            }
            trace!(key = %key, "decoded target");
            self.targets.targets.insert(key, target);
        }
        Ok(())
    }
}

/// Decode a parsed target's raw sub-documents into a fresh skeleton.
fn bind<F: TargetFactory + ?Sized>(factory: &F, parsed: ParsedTarget) -> Result<Target> {
    let mut target = factory.new_target(&parsed.recipe_name, &parsed.recipe_iaas)?;

    target.recipe.load(&parsed.recipe)?;
    target.provider.load(&parsed.provider)?;
    match (target.backend.as_mut(), parsed.backend.as_deref()) {
        (Some(backend), Some(raw)) => backend.load(raw)?,
        (None, Some(raw)) if raw.get() != "null" => {
            warn!(
                recipe = %parsed.recipe_name,
                iaas = %parsed.recipe_iaas,
                "ignoring backend for recipe without a backend type"
            );
        }
        _ => {}
    }
    target.output = parsed.output;
    target.cookbook_timestamp = parsed.cookbook_timestamp;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloud::{ProviderConfig, RecipeConfig};
    use crate::error::ConfigError;

    /// Builds targets for `app` recipes on `aws` only.
    struct Factory;

    impl TargetFactory for Factory {
        fn new_target(&self, recipe_name: &str, recipe_iaas: &str) -> Result<Target> {
            if recipe_name != "app" || recipe_iaas != "aws" {
                return Err(ConfigError::RecipeNotFound {
                    recipe: recipe_name.to_string(),
                    iaas: recipe_iaas.to_string(),
                }
                .into());
            }
            let recipe = RecipeConfig::new("app", "aws", &["group", "name"])
                .with_key_fields(&["group", "name"]);
            Ok(Target::new(
                Box::new(recipe),
                Box::new(ProviderConfig::new("aws", &["region"])),
                None,
            ))
        }
    }

    fn target(group: &str, name: &str) -> Target {
        let mut t = Factory.new_target("app", "aws").unwrap();
        t.recipe.set_value("group", group).unwrap();
        t.recipe.set_value("name", name).unwrap();
        t
    }

    fn insert(set: &mut TargetSet, t: Target) {
        let key = t.key();
        set.save_target(&key, t);
    }

    #[test]
    fn test_lookup_sorted_by_deployment_name() {
        let mut set = TargetSet::new();
        insert(&mut set, target("x", "db-2"));
        insert(&mut set, target("x", "db-1"));
        insert(&mut set, target("y", "db-0"));
        insert(&mut set, target("x", "db-3"));

        let names: Vec<String> = set
            .lookup("app", "aws", &["x"])
            .iter()
            .map(|t| t.deployment_name())
            .collect();
        assert_eq!(names, vec!["db-1", "db-2", "db-3"]);

        assert_eq!(set.lookup("app", "aws", &[]).len(), 4);
        assert!(set.lookup("app", "google", &[]).is_empty());
    }

    #[test]
    fn test_save_target_rekeys() {
        let mut set = TargetSet::new();
        insert(&mut set, target("x", "old"));
        assert!(set.contains("app/aws/x/old"));

        let mut t = set.delete_target("app/aws/x/old").unwrap();
        insert(&mut set, t.copy().unwrap());
        t.recipe.set_value("name", "new").unwrap();
        set.save_target("app/aws/x/old", t);

        assert!(set.get_target("app/aws/x/new").is_some());
        assert!(set.get_target("app/aws/x/old").is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut set = TargetSet::new();
        insert(&mut set, target("x", "a"));
        assert!(set.delete_target("app/aws/x/a").is_some());
        assert!(set.delete_target("app/aws/x/a").is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_unmarshal_builds_through_factory() {
        let json = r#"[
            {"recipeName":"app","recipeIaas":"aws",
             "recipe":{"group":"g","name":"web"},
             "provider":{"region":"us-west-2"},
             "backend":null,
             "output":{"ip":{"sensitive":false,"type":"string","value":"1.2.3.4"}},
             "cookbook_timestamp":"ts1"}
        ]"#;

        let mut set = TargetSet::new();
        set.unmarshal(json, &Factory).unwrap();

        let t = set.get_target("app/aws/g/web").unwrap();
        assert_eq!(t.provider.get_value("region").unwrap().as_deref(), Some("us-west-2"));
        assert_eq!(t.cookbook_timestamp, "ts1");
        assert_eq!(t.output.as_ref().unwrap()["ip"].value, "1.2.3.4");
    }

    #[test]
    fn test_unmarshal_unknown_recipe_fails() {
        let json = r#"[{"recipeName":"other","recipeIaas":"aws","recipe":{},"provider":{}}]"#;
        let mut set = TargetSet::new();
        let err = set.unmarshal(json, &Factory).unwrap_err();
        assert!(err
            .to_string()
            .contains("recipe 'other' for iaas 'aws' does not exist"));
    }

    #[test]
    fn test_serialize_then_unmarshal() {
        let mut set = TargetSet::new();
        insert(&mut set, target("x", "a"));
        insert(&mut set, target("x", "b"));

        let json = serde_json::to_string(&set).unwrap();
        let mut restored = TargetSet::new();
        restored.unmarshal(&json, &Factory).unwrap();

        assert_eq!(restored.len(), 2);
        assert!(restored.contains("app/aws/x/a"));
        assert!(restored.contains("app/aws/x/b"));
    }

    #[test]
    fn test_unmarshal_rejects_duplicate_keys() {
        let entry = r#"{"recipeName":"app","recipeIaas":"aws",
            "recipe":{"group":"g","name":"n"},"provider":{"region":"r"}}"#;
        let json = format!("[{},{}]", entry, entry);

        let mut set = TargetSet::new();
        let err = set.unmarshal(&json, &Factory).unwrap_err();
        assert!(err.to_string().contains("duplicate target 'app/aws/g/n'"));
    }

    #[test]
    fn test_lookup_ties_keep_every_target() {
        let mut set = TargetSet::new();
        insert(&mut set, target("x", "same"));
        insert(&mut set, target("xy", "same"));

        let found = set.lookup("app", "aws", &["x"]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|t| t.deployment_name() == "same"));
    }

    #[test]
    fn test_empty_array() {
        let mut set = TargetSet::new();
        set.unmarshal("[]", &Factory).unwrap();
        assert!(set.is_empty());
        assert_eq!(serde_json::to_string(&set).unwrap(), "[]");
    }
}
