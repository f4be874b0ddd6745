//! Representation tag carried by every tensor.

use std::fmt;

/// How a tensor's values are currently stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    /// 32-bit floating point (default)
    #[default]
    Fp32,
    /// 8-bit signed integer with an attached scale/zero-point
    Int8,
}

impl Representation {
    /// Size of one element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Representation::Fp32 => 4,
            Representation::Int8 => 1,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Representation::Fp32 => "fp32",
            Representation::Int8 => "int8",
        }
    }

    /// Whether this is a quantized representation
    pub fn is_quantized(&self) -> bool {
        matches!(self, Representation::Int8)
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
