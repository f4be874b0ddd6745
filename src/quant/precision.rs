//! Low-precision target formats.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Low-precision format that quantized slots are converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPrecision {
    /// Signed 8-bit integer, range [-128, 127]
    #[default]
    Int8,
}

impl TargetPrecision {
    /// Number of bits per element
    pub fn bits(&self) -> u32 {
        match self {
            TargetPrecision::Int8 => 8,
        }
    }

    /// Smallest representable integer
    pub fn qmin(&self) -> i32 {
        match self {
            TargetPrecision::Int8 => i32::from(i8::MIN),
        }
    }

    /// Largest representable integer
    pub fn qmax(&self) -> i32 {
        match self {
            TargetPrecision::Int8 => i32::from(i8::MAX),
        }
    }

    /// Largest magnitude a symmetric mapping targets (127 for int8)
    pub fn representable_max(&self) -> f32 {
        self.qmax() as f32
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            TargetPrecision::Int8 => "int8",
        }
    }
}

impl fmt::Display for TargetPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int8_range() {
        let p = TargetPrecision::Int8;
        assert_eq!(p.qmin(), -128);
        assert_eq!(p.qmax(), 127);
        assert_eq!(p.representable_max(), 127.0);
        assert_eq!(p.bits(), 8);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&TargetPrecision::Int8).unwrap();
        assert_eq!(json, "\"int8\"");
        assert_eq!(format!("{}", TargetPrecision::Int8), "int8");
    }
}
