//! Encoding of a configuration document in fixed section order.

use std::io::Write;

use serde_json::value::RawValue;
use tracing::debug;

use super::Context;
use crate::core::cloud::Configurable;
use crate::error::Result;

impl Context {
    /// Encode this context as a configuration document.
    ///
    /// Sections are written in a fixed order: providers, backends, recipes,
    /// targets. Registry entries appear in name order. The writer is not
    /// buffered here; wrap files in a `BufWriter`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if writing fails, or the first encode failure of a
    /// provider, backend, recipe or target.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        debug!(
            providers = self.providers.len(),
            backends = self.backends.len(),
            targets = self.targets.len(),
            "saving configuration"
        );

        writer.write_all(br#"{"cloud":{"providers":{"#)?;
        write_entries(
            &mut writer,
            self.providers.iter().map(|(name, p)| (name.as_str(), p.save())),
        )?;

        writer.write_all(br#"},"backends":{"#)?;
        write_entries(
            &mut writer,
            self.backends.iter().map(|(name, b)| (name.as_str(), b.save())),
        )?;

        writer.write_all(br#"},"recipes":"#)?;
        serde_json::to_writer(&mut writer, &self.cookbook)?;

        writer.write_all(br#","targets":"#)?;
        serde_json::to_writer(&mut writer, &self.targets)?;

        writer.write_all(b"}}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Write `"name":<payload>` pairs separated by commas.
fn write_entries<'a, W, I>(writer: &mut W, entries: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = (&'a str, Result<Box<RawValue>>)>,
{
    for (i, (name, encoded)) in entries.enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut *writer, name)?;
        writer.write_all(b":")?;
        writer.write_all(encoded?.get().as_bytes())?;
    }
    Ok(())
}
