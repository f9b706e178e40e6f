//! Streaming, schema-strict decode of a configuration document.

use std::fmt;
use std::io::{BufRead, BufReader, Read};

use serde::de::{DeserializeSeed, Error as _, MapAccess, Visitor};
use serde::Deserializer;
use tracing::{debug, trace};

use super::{Context, Resolver};
use crate::core::cloud::InPlace;
use crate::error::{ConfigError, Error, Result};

impl Context {
    /// Decode a configuration document into this context.
    ///
    /// Provider and backend entries decode into the registered instance of
    /// the same name. Recipes decode into the packaged cookbook. Targets
    /// replace the current target set. Nothing changes unless the whole
    /// document decodes; empty input is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Schema` for unknown keys, unregistered names or
    /// malformed payloads, and `Error::Io` if reading fails.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut reader = BufReader::new(reader);
        if reader.fill_buf()?.is_empty() {
            debug!("empty configuration document");
            return Ok(());
        }

        let mut staged = self.staged()?;
        let mut de = serde_json::Deserializer::from_reader(reader);
        SectionSeed {
            section: Section::Root,
            ctx: &mut staged,
        }
        .deserialize(&mut de)
        .map_err(decode_error)?;
        de.end().map_err(decode_error)?;

        debug!(
            providers = staged.providers.len(),
            backends = staged.backends.len(),
            recipes = staged.cookbook.len(),
            targets = staged.targets.len(),
            "configuration loaded"
        );
        *self = staged;
        Ok(())
    }
}

fn decode_error(err: serde_json::Error) -> Error {
    if err.is_io() {
        Error::Io(err.into())
    } else {
        ConfigError::Schema(err).into()
    }
}

/// Nesting level of the decoder.
#[derive(Debug, Clone, Copy)]
enum Section {
    Root,
    Cloud,
    Providers,
    Backends,
}

struct SectionSeed<'a> {
    section: Section,
    ctx: &'a mut Context,
}

impl<'de> DeserializeSeed<'de> for SectionSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for SectionSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.section {
            Section::Root => f.write_str("a configuration document"),
            Section::Cloud => f.write_str("the 'cloud' section"),
            Section::Providers => f.write_str("a map of cloud providers"),
            Section::Backends => f.write_str("a map of cloud backends"),
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let SectionSeed { section, ctx } = self;

        while let Some(key) = map.next_key::<String>()? {
            trace!(section = ?section, key = %key, "decoding");

            match (section, key.as_str()) {
                (Section::Root, "cloud") => map.next_value_seed(SectionSeed {
                    section: Section::Cloud,
                    ctx: &mut *ctx,
                })?,
                (Section::Root, _) => {
                    return Err(A::Error::custom(format!("invalid root config key '{}'", key)));
                }

                (Section::Cloud, "providers") => map.next_value_seed(SectionSeed {
                    section: Section::Providers,
                    ctx: &mut *ctx,
                })?,
                (Section::Cloud, "backends") => map.next_value_seed(SectionSeed {
                    section: Section::Backends,
                    ctx: &mut *ctx,
                })?,
                (Section::Cloud, "recipes") => map.next_value_seed(ctx.cookbook.seed())?,
                (Section::Cloud, "targets") => {
                    let Context {
                        cookbook,
                        providers,
                        backends,
                        targets,
                    } = &mut *ctx;
                    let resolver = Resolver {
                        cookbook,
                        providers,
                        backends,
                    };
                    map.next_value_seed(targets.seed(&resolver))?
                }
                (Section::Cloud, _) => {
                    return Err(A::Error::custom(format!(
                        "invalid 'cloud' config key '{}'",
                        key
                    )));
                }

                (Section::Providers, name) => match ctx.providers.get_mut(name) {
                    Some(provider) => map.next_value_seed(InPlace(provider.as_mut()))?,
                    None => {
                        return Err(A::Error::custom(format!("invalid cloud provider '{}'", name)));
                    }
                },
                (Section::Backends, name) => match ctx.backends.get_mut(name) {
                    Some(backend) => map.next_value_seed(InPlace(backend.as_mut()))?,
                    None => {
                        return Err(A::Error::custom(format!("invalid cloud backend '{}'", name)));
                    }
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloud::{self, CloudProvider, Configurable, ProviderConfig};
    use crate::core::cookbook::Cookbook;

    fn context() -> Context {
        Context::new(
            Cookbook::new("ts"),
            cloud::providers([Box::new(ProviderConfig::new("aws", &["region"])) as Box<dyn CloudProvider>]),
            cloud::Backends::new(),
        )
    }

    fn region(ctx: &Context) -> Option<String> {
        ctx.get_cloud_provider("aws").unwrap().get_value("region").unwrap()
    }

    #[test]
    fn test_load_provider_in_place() {
        let mut ctx = context();
        ctx.load(r#"{"cloud":{"providers":{"aws":{"region":"us-east-1"}}}}"#.as_bytes())
            .unwrap();
        assert_eq!(region(&ctx).as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut ctx = context();
        ctx.load(&b""[..]).unwrap();
        assert_eq!(region(&ctx), None);
    }

    #[test]
    fn test_invalid_root_key() {
        let mut ctx = context();
        let err = ctx.load(r#"{"clouds":{}}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Schema(_))));
        assert!(err.to_string().contains("invalid root config key 'clouds'"));
    }

    #[test]
    fn test_invalid_cloud_key() {
        let mut ctx = context();
        let err = ctx.load(r#"{"cloud":{"widgets":{}}}"#.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid 'cloud' config key 'widgets'"));
    }

    #[test]
    fn test_unregistered_names() {
        let mut ctx = context();
        let err = ctx
            .load(r#"{"cloud":{"providers":{"unknownName":{}}}}"#.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("invalid cloud provider 'unknownName'"));

        let err = ctx
            .load(r#"{"cloud":{"backends":{"gcs":{}}}}"#.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("invalid cloud backend 'gcs'"));
    }

    #[test]
    fn test_failed_load_leaves_context_unchanged() {
        let mut ctx = context();
        ctx.load(r#"{"cloud":{"providers":{"aws":{"region":"a"}}}}"#.as_bytes())
            .unwrap();

        let err = ctx
            .load(r#"{"cloud":{"providers":{"aws":{"region":"b"}},"bogus":1}}"#.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert_eq!(region(&ctx).as_deref(), Some("a"));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut ctx = context();
        assert!(ctx.load(r#"{"cloud":{}} {"#.as_bytes()).is_err());
    }
}
