//! One quantization decision per operator slot.

use super::OpKind;
use crate::quant::{QuantParams, Quantizer, StatisticsAccumulator};
use crate::{Error, Result};

/// Slot keyed by its position in execution order
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizationRecord {
    /// Ordinal position in execution order (0-based)
    pub op_index: usize,
    /// Kind of operator that owns the slot
    pub op_kind: OpKind,
    /// Whether the slot runs in low precision; user-editable
    pub enabled: bool,
    /// Range of the operator's inputs seen during calibration
    pub stats: Option<StatisticsAccumulator>,
    /// Parameters for the operator's inputs
    pub params: Option<QuantParams>,
    /// Range of the operator's outputs seen during calibration
    pub output_stats: Option<StatisticsAccumulator>,
    /// Requantization target for the operator's outputs
    pub output_params: Option<QuantParams>,
}

impl QuantizationRecord {
    /// Fresh slot, enabled, with no statistics yet
    pub fn new(op_index: usize, op_kind: OpKind) -> Self {
        Self {
            op_index,
            op_kind,
            enabled: true,
            stats: None,
            params: None,
            output_stats: None,
            output_params: None,
        }
    }

    /// Merge one invocation's observations
    pub fn observe(
        &mut self,
        input: Option<StatisticsAccumulator>,
        output: Option<StatisticsAccumulator>,
    ) {
        StatisticsAccumulator::accumulate(&mut self.stats, input);
        StatisticsAccumulator::accumulate(&mut self.output_stats, output);
    }

    /// Re-derive parameters from statistics
    ///
    /// Disabled slots and slots without statistics keep whatever parameters
    /// they already carry. A degenerate range clears the parameters so the
    /// slot fails at inference time.
    pub fn derive(&mut self, quantizer: &Quantizer) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut first_error = None;
        if let Some(stats) = &self.stats {
            match quantizer.derive_parameters(stats) {
                Ok(params) => self.params = Some(params),
                Err(e) => {
                    self.params = None;
                    first_error = Some(e.at_slot(self.op_index));
                }
            }
        }
        if let Some(stats) = &self.output_stats {
            // Output parameters are optional; the kernel picks its own when absent
            self.output_params = quantizer.derive_parameters(stats).ok();
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Input parameters an enabled slot quantizes with
    pub fn input_params(&self) -> Result<QuantParams> {
        match self.params {
            Some(params) if params.is_valid() => Ok(params),
            Some(params) => Err(Error::InvalidStatistics {
                op_index: Some(self.op_index),
                reason: format!("scale {} is not a positive finite number", params.scale),
            }),
            None => Err(Error::InvalidStatistics {
                op_index: Some(self.op_index),
                reason: match &self.stats {
                    Some(s) if s.is_degenerate() => {
                        "quantization enabled but the observed range is [0, 0]".to_string()
                    }
                    Some(_) => "quantization enabled but parameters were never derived".to_string(),
                    None => "quantization enabled but no scale or statistics recorded".to_string(),
                },
            }),
        }
    }

    /// Whether the slot carries everything inference needs to quantize it
    pub fn is_ready(&self) -> bool {
        !self.enabled || self.input_params().is_ok()
    }
}
