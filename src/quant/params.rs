//! Affine quantization parameters

use serde::{Deserialize, Serialize};

use super::TargetPrecision;

/// Scale and zero-point mapping floats to the low-precision grid
///
/// `q = round(x / scale) + zero_point`, `x' = (q - zero_point) * scale`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    /// Step between adjacent quantized values
    pub scale: f32,
    /// Quantized value representing 0.0
    pub zero_point: i32,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }

    /// Usable for division: finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0
    }

    /// Whether the zero point lies on the grid of `precision`
    pub fn fits(&self, precision: TargetPrecision) -> bool {
        (precision.qmin()..=precision.qmax()).contains(&self.zero_point)
    }

    /// Map a single quantized value back to floating point
    pub fn dequantize_value(&self, q: i8) -> f32 {
        (i32::from(q) - self.zero_point) as f32 * self.scale
    }
}
