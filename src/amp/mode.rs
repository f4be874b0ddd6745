//! Runtime mode of the interceptor.

use std::fmt;

/// What intercepted operators do in the current scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunningMode {
    /// Pass-through; everything stays fp32 (default)
    #[default]
    Disabled,
    /// Record activation ranges, run in fp32
    Calibration,
    /// Apply recorded parameters, run enabled slots in int8
    Inference,
}

impl RunningMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunningMode::Disabled => "disabled",
            RunningMode::Calibration => "calibration",
            RunningMode::Inference => "inference",
        }
    }

    /// Whether operators consume slots in this mode
    pub fn uses_slots(&self) -> bool {
        !matches!(self, RunningMode::Disabled)
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RunningMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "calibration" | "calibrate" => Ok(Self::Calibration),
            "inference" => Ok(Self::Inference),
            _ => Err(format!(
                "Unknown running mode: {s}. Use: disabled, calibration, inference"
            )),
        }
    }
}
