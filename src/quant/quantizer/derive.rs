//! Parameter derivation from recorded statistics

use super::Quantizer;
use crate::quant::{QuantParams, StatisticsAccumulator};
use crate::{Error, Result};

impl Quantizer {
    /// Derive symmetric parameters from an observed range
    ///
    /// Degenerate (`min == max == 0`) or non-finite ranges are rejected
    /// instead of producing a zero scale.
    pub fn derive_parameters(&self, stats: &StatisticsAccumulator) -> Result<QuantParams> {
        if !stats.is_consistent() {
            return Err(Error::invalid_stats(format!(
                "inconsistent range [{}, {}]",
                stats.min, stats.max
            )));
        }
        if stats.is_degenerate() {
            return Err(Error::invalid_stats(
                "degenerate range [0, 0] would produce a zero scale",
            ));
        }

        let scale = stats.max_abs() / self.precision.representable_max();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::invalid_stats(format!(
                "range [{}, {}] yields unusable scale {scale}",
                stats.min, stats.max
            )));
        }

        Ok(QuantParams::new(scale, 0))
    }

    /// Derive parameters straight from raw values
    pub fn derive_from_values(&self, data: &[f32]) -> Result<QuantParams> {
        let stats = StatisticsAccumulator::from_values(data)
            .ok_or_else(|| Error::invalid_stats("no finite values observed"))?;
        self.derive_parameters(&stats)
    }
}
