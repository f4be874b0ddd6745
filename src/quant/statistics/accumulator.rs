//! Running min/max accumulator.

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Observed range of a slot across all calibration invocations
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsAccumulator {
    /// Running minimum
    pub min: f32,
    /// Running maximum
    pub max: f32,
    /// Number of batches merged into this range
    ///
    /// Diagnostic only: it grows with every merge, so unlike the range it is
    /// not idempotent under repeated inputs and never feeds derivation.
    #[serde(default)]
    pub batches: u64,
}

impl StatisticsAccumulator {
    /// Range of a single batch. Non-finite values are skipped; `None` when no
    /// finite value remains.
    pub fn from_values(data: &[f32]) -> Option<Self> {
        let (min, max) = data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self {
            min,
            max,
            batches: 1,
        })
    }

    /// Range over all values of several tensors, observed as one batch
    pub fn from_tensors(tensors: &[Tensor]) -> Option<Self> {
        let merged = tensors
            .iter()
            .filter_map(|t| Self::from_values(&t.to_f32_vec()))
            .reduce(|a, b| a.merge(&b))?;
        Some(Self {
            batches: 1,
            ..merged
        })
    }

    /// Widen this range by a batch of values
    pub fn observe(&mut self, data: &[f32]) {
        if let Some(batch) = Self::from_values(data) {
            *self = self.merge(&batch);
        }
    }

    /// Combine two ranges
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            batches: self.batches.saturating_add(other.batches),
        }
    }

    /// Merge `observed` into an optional running range, initializing it on
    /// first observation
    pub fn accumulate(slot: &mut Option<Self>, observed: Option<Self>) {
        if let Some(observed) = observed {
            *slot = Some(match slot.take() {
                Some(current) => current.merge(&observed),
                None => observed,
            });
        }
    }

    /// Largest absolute value in the range
    pub fn max_abs(&self) -> f32 {
        self.min.abs().max(self.max.abs())
    }

    /// Whether the range carries no magnitude (`min == max == 0`)
    pub fn is_degenerate(&self) -> bool {
        self.max_abs() == 0.0
    }

    /// Whether both bounds are finite and ordered
    pub fn is_consistent(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}
