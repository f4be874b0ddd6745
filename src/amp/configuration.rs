//! Ordered per-slot decisions for one model topology.

use std::path::Path;

use super::store::{ConfigStore, StoreOptions};
use super::{OpKind, QuantizationRecord};
use crate::quant::{Quantizer, StatisticsAccumulator, TargetPrecision};
use crate::{Error, Result};

/// Positional list of [`QuantizationRecord`]s plus the target format
///
/// Slot `i` always describes the `i`-th intercepted operator of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct MixedPrecisionConfiguration {
    target: TargetPrecision,
    records: Vec<QuantizationRecord>,
}

impl MixedPrecisionConfiguration {
    /// Empty configuration, ready for calibration
    pub fn new(target: TargetPrecision) -> Self {
        Self {
            target,
            records: Vec::new(),
        }
    }

    /// Build from records, checking that `op_index` runs 0..n
    pub fn from_records(target: TargetPrecision, records: Vec<QuantizationRecord>) -> Result<Self> {
        if let Some((pos, record)) = records
            .iter()
            .enumerate()
            .find(|(pos, r)| r.op_index != *pos)
        {
            return Err(Error::MalformedConfiguration(format!(
                "op_index sequence is not contiguous from 0: position {pos} holds op_index {}",
                record.op_index
            )));
        }
        Ok(Self { target, records })
    }

    /// Load a saved configuration (see [`ConfigStore::load`])
    pub fn from_file(target: TargetPrecision, path: impl AsRef<Path>) -> Result<Self> {
        ConfigStore::load(path, target)
    }

    /// Save with default options (see [`ConfigStore::save`])
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        ConfigStore::save(self, path, &StoreOptions::default())
    }

    pub fn target(&self) -> TargetPrecision {
        self.target
    }

    pub fn quantizer(&self) -> Quantizer {
        Quantizer::new(self.target)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[QuantizationRecord] {
        &self.records
    }

    pub fn get(&self, op_index: usize) -> Option<&QuantizationRecord> {
        self.records.get(op_index)
    }

    pub fn get_mut(&mut self, op_index: usize) -> Option<&mut QuantizationRecord> {
        self.records.get_mut(op_index)
    }

    /// Toggle quantization for a slot
    pub fn set_enabled(&mut self, op_index: usize, enabled: bool) -> Result<()> {
        let len = self.records.len();
        let record = self.records.get_mut(op_index).ok_or_else(|| {
            Error::mismatch(format!("slot {op_index} does not exist ({len} slots)"))
        })?;
        record.enabled = enabled;
        Ok(())
    }

    /// Number of slots with quantization enabled
    pub fn enabled_count(&self) -> usize {
        self.records.iter().filter(|r| r.enabled).count()
    }

    /// Record one calibration invocation at `op_index`
    ///
    /// The slot is appended on first encounter; an existing slot must have
    /// the same kind.
    pub fn record_observation(
        &mut self,
        op_index: usize,
        op_kind: OpKind,
        input: Option<StatisticsAccumulator>,
        output: Option<StatisticsAccumulator>,
    ) -> Result<()> {
        if op_index == self.records.len() {
            tracing::debug!(op_index, kind = %op_kind, "new calibration slot");
            self.records.push(QuantizationRecord::new(op_index, op_kind));
        }

        let record = self.records.get_mut(op_index).ok_or_else(|| Error::ConfigurationMismatch {
            op_index: Some(op_index),
            message: "slot index skipped ahead of the recorded sequence".to_string(),
        })?;

        if record.op_kind != op_kind {
            return Err(Error::ConfigurationMismatch {
                op_index: Some(op_index),
                message: format!(
                    "slot records '{}' but the run executed '{op_kind}'",
                    record.op_kind
                ),
            });
        }

        record.observe(input, output);
        Ok(())
    }

    /// Derive parameters for every enabled slot that has statistics
    ///
    /// Slots with degenerate ranges are left without parameters and reported
    /// in the returned list; they fail when inference reaches them.
    pub fn finalize(&mut self) -> Vec<Error> {
        let quantizer = self.quantizer();
        let problems: Vec<Error> = self
            .records
            .iter_mut()
            .filter_map(|r| r.derive(&quantizer).err())
            .collect();

        for problem in &problems {
            tracing::warn!(error = %problem, "slot left without quantization parameters");
        }
        problems
    }

    /// Check the configuration can start an inference run
    pub fn check_inference_ready(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::mismatch(
                "inference requires a calibrated configuration, but it has zero slots",
            ));
        }
        Ok(())
    }
}

impl Default for MixedPrecisionConfiguration {
    fn default() -> Self {
        Self::new(TargetPrecision::default())
    }
}
