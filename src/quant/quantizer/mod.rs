//! Scale derivation and int8 conversion
//!
//! Symmetric mapping onto the target grid:
//! - `scale = max(|min|, |max|) / representable_max`, `zero_point = 0`
//! - `q = clamp(round(x / scale) + zero_point, qmin, qmax)`
//! - `x' = (q - zero_point) * scale`
//!
//! Round-trip is lossy but monotonic and within half a step inside the
//! calibrated range.

mod convert;
mod derive;


use super::TargetPrecision;

/// Converts between floating and low-precision tensors for one target format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quantizer {
    precision: TargetPrecision,
}

impl Quantizer {
    pub fn new(precision: TargetPrecision) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> TargetPrecision {
        self.precision
    }
}
