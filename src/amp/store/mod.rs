//! Persistence of mixed-precision configurations
//!
//! The document is a bare ordered list of slot records:
//!
//! ```json
//! [
//!   { "op_index": 0, "op_kind": "conv2d", "quantized": true, "scale": 0.0236, "zero_point": 0 },
//!   { "op_index": 1, "op_kind": "relu", "quantized": false }
//! ]
//! ```
//!
//! List order is the only correspondence to operators in a later run. The
//! target precision is not stored; callers pass it to [`ConfigStore::load`].

mod entry;
mod format;


pub use format::{ConfigFormat, StoreOptions};

use std::fs;
use std::path::Path;

use entry::RecordEntry;

use super::MixedPrecisionConfiguration;
use crate::quant::TargetPrecision;
use crate::{Error, Result};

/// Save/load entry point; holds no state between calls
pub struct ConfigStore;

impl ConfigStore {
    /// Serialize `config` to `path`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use automix::{ConfigStore, MixedPrecisionConfiguration, StoreOptions, TargetPrecision};
    ///
    /// let config = MixedPrecisionConfiguration::new(TargetPrecision::Int8);
    /// let options = StoreOptions::new().with_stats(true);
    /// ConfigStore::save(&config, "configure.yaml", &options)?;
    /// # Ok::<(), automix::Error>(())
    /// ```
    pub fn save(
        config: &MixedPrecisionConfiguration,
        path: impl AsRef<Path>,
        options: &StoreOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = options.resolve_format(path);
        let data = Self::to_string(config, format, options)?;
        fs::write(path, data)?;

        tracing::info!(
            path = %path.display(),
            slots = config.len(),
            enabled = config.enabled_count(),
            format = format.name(),
            "saved mixed-precision configuration"
        );
        Ok(())
    }

    /// Load a configuration, detecting the format from the extension
    pub fn load(path: impl AsRef<Path>, target: TargetPrecision) -> Result<MixedPrecisionConfiguration> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_str(&content, ConfigFormat::from_path(path), target)?;

        tracing::info!(
            path = %path.display(),
            slots = config.len(),
            enabled = config.enabled_count(),
            "loaded mixed-precision configuration"
        );
        Ok(config)
    }

    /// Render a configuration as text
    pub fn to_string(
        config: &MixedPrecisionConfiguration,
        format: ConfigFormat,
        options: &StoreOptions,
    ) -> Result<String> {
        let entries: Vec<RecordEntry> = config
            .records()
            .iter()
            .map(|r| RecordEntry::from_record(r, options.include_stats))
            .collect();

        match format {
            ConfigFormat::Json if options.pretty => serde_json::to_string_pretty(&entries)
                .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}"))),
            ConfigFormat::Json => serde_json::to_string(&entries)
                .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}"))),
            ConfigFormat::Yaml => serde_yaml::to_string(&entries)
                .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}"))),
        }
    }

    /// Parse and validate a configuration document
    ///
    /// Either the whole document loads or nothing does.
    pub fn from_str(
        content: &str,
        format: ConfigFormat,
        target: TargetPrecision,
    ) -> Result<MixedPrecisionConfiguration> {
        let entries: Vec<RecordEntry> = match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                Error::MalformedConfiguration(format!("JSON deserialization failed: {e}"))
            })?,
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                Error::MalformedConfiguration(format!("YAML deserialization failed: {e}"))
            })?,
        };

        if entries.is_empty() {
            return Err(Error::MalformedConfiguration(
                "slot list is empty".to_string(),
            ));
        }

        let records = entries
            .into_iter()
            .map(|entry| entry.into_record(target))
            .collect::<Result<Vec<_>>>()?;

        let config = MixedPrecisionConfiguration::from_records(target, records)?;
        for record in config.records().iter().filter(|r| r.enabled && !r.is_ready()) {
            tracing::warn!(
                op_index = record.op_index,
                kind = %record.op_kind,
                "slot is quantized but has no usable scale; inference will fail here"
            );
        }
        Ok(config)
    }
}
