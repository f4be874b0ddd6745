//! automix: post-training int8 mixed precision for sequential models
//!
//! Two-phase workflow:
//! - **Calibration**: run the model in fp32 while every intercepted operator
//!   records the range of its activations into a positional slot.
//! - **Inference**: replay the derived scale/zero-point per slot, executing
//!   enabled operators through their int8 kernels.
//!
//! The per-slot decisions live in a [`MixedPrecisionConfiguration`] that can be
//! saved, hand-edited and loaded back with [`ConfigStore`].
//!
//! ```no_run
//! use automix::nn::{Linear, Sequential};
//! use automix::{
//!     ConfigStore, MixedPrecisionConfiguration, RunningMode, RuntimeModeContext, StoreOptions,
//!     TargetPrecision, Tensor,
//! };
//!
//! # fn main() -> automix::Result<()> {
//! let model = Sequential::new(vec![Box::new(Linear::new(vec![0.5, -0.25], 2, 1, None)?)]);
//! let x = Tensor::new(vec![1.0, -2.0], &[1, 2])?;
//!
//! let mut conf = MixedPrecisionConfiguration::new(TargetPrecision::Int8);
//! let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration)?;
//! model.forward(x.clone())?;
//! scope.exit()?;
//! ConfigStore::save(&conf, "configure.json", &StoreOptions::default())?;
//!
//! let mut conf = ConfigStore::load("configure.json", TargetPrecision::Int8)?;
//! let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference)?;
//! let y = model.forward(x)?;
//! scope.exit()?;
//! assert!(y[0].is_quantized());
//! # Ok(())
//! # }
//! ```

pub mod amp;
pub mod cli;
pub mod error;
pub mod nn;
pub mod quant;
pub mod tensor;

pub use amp::{
    ConfigFormat, ConfigStore, MixedPrecisionConfiguration, ModeGuard, OpCategory, OpKind,
    OperatorInterceptor, QuantizationRecord, RunningMode, RuntimeModeContext, StoreOptions,
};
pub use error::{Error, Result};
pub use quant::{QuantParams, Quantizer, StatisticsAccumulator, TargetPrecision};
pub use tensor::{Representation, Tensor};
