//! Quantization: statistics, parameters and int8 conversion
//!
//! Provides the numeric half of post-training quantization:
//! - Running min/max accumulation over calibration batches
//! - Symmetric scale/zero-point derivation for the int8 target
//! - Quantize / dequantize / requantize of tagged tensors

mod params;
mod precision;
mod quantizer;
mod statistics;

pub use params::QuantParams;
pub use precision::TargetPrecision;
pub use quantizer::Quantizer;
pub use statistics::StatisticsAccumulator;
