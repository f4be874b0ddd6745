//! Automatic mixed precision: calibration and int8 inference
//!
//! - [`MixedPrecisionConfiguration`]: ordered per-slot decisions
//! - [`RuntimeModeContext`]: scoped per-thread mode switch
//! - [`OperatorInterceptor`]: per-operator dispatch on the current mode
//! - [`ConfigStore`]: save/load of configurations as JSON or YAML

mod configuration;
mod context;
mod interceptor;
mod mode;
mod op_kind;
mod record;
mod store;

#[cfg(test)]
mod tests;

pub use configuration::MixedPrecisionConfiguration;
pub use context::{ModeGuard, RuntimeModeContext};
pub use interceptor::OperatorInterceptor;
pub use mode::RunningMode;
pub use op_kind::{OpCategory, OpKind};
pub use record::QuantizationRecord;
pub use store::{ConfigFormat, ConfigStore, StoreOptions};
