//! Error types for calibration, inference and configuration persistence.
//!
//! Every failure a forward pass, load or save can surface is a distinct
//! variant; nothing is downgraded to a different precision or skipped.

use crate::tensor::Representation;
use thiserror::Error;

/// Result type alias for automix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the mixed-precision core.
#[derive(Error, Debug)]
pub enum Error {
    /// Slot count or topology does not match the current run.
    #[error("Configuration mismatch{}: {message}", slot_suffix(.op_index))]
    ConfigurationMismatch {
        op_index: Option<usize>,
        message: String,
    },

    /// Degenerate or absent range where quantization was requested.
    #[error("Invalid statistics{}: {reason}", slot_suffix(.op_index))]
    InvalidStatistics {
        op_index: Option<usize>,
        reason: String,
    },

    /// No low-precision execution path for the requested operator kind.
    #[error("Unsupported operator '{kind}' at slot {op_index}: no int8 kernel\n  → Set \"quantized\": false for this slot")]
    UnsupportedOperator { op_index: usize, kind: String },

    /// A tensor's representation tag does not match what the current mode expects.
    #[error("Representation mismatch{}: expected {expected}, got {actual}", slot_suffix(.op_index))]
    RepresentationMismatch {
        op_index: Option<usize>,
        expected: Representation,
        actual: Representation,
    },

    /// Persisted resource failed structural validation on load.
    #[error("Malformed configuration: {0}")]
    MalformedConfiguration(String),

    /// Tensor data does not fit the requested shape.
    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn slot_suffix(op_index: &Option<usize>) -> String {
    op_index.map(|i| format!(" at slot {i}")).unwrap_or_default()
}

impl Error {
    /// Configuration mismatch not tied to a particular slot.
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::ConfigurationMismatch {
            op_index: None,
            message: message.into(),
        }
    }

    /// Invalid statistics not yet tied to a slot.
    pub fn invalid_stats(reason: impl Into<String>) -> Self {
        Self::InvalidStatistics {
            op_index: None,
            reason: reason.into(),
        }
    }

    /// Representation mismatch not yet tied to a slot.
    pub fn representation(expected: Representation, actual: Representation) -> Self {
        Self::RepresentationMismatch {
            op_index: None,
            expected,
            actual,
        }
    }

    /// Attach slot context to an error raised below the interceptor.
    ///
    /// Existing slot context is never overwritten.
    pub fn at_slot(self, index: usize) -> Self {
        match self {
            Self::ConfigurationMismatch {
                op_index: None,
                message,
            } => Self::ConfigurationMismatch {
                op_index: Some(index),
                message,
            },
            Self::InvalidStatistics {
                op_index: None,
                reason,
            } => Self::InvalidStatistics {
                op_index: Some(index),
                reason,
            },
            Self::RepresentationMismatch {
                op_index: None,
                expected,
                actual,
            } => Self::RepresentationMismatch {
                op_index: Some(index),
                expected,
                actual,
            },
            other => other,
        }
    }

    /// Slot the error refers to, if known.
    pub fn op_index(&self) -> Option<usize> {
        match self {
            Self::ConfigurationMismatch { op_index, .. }
            | Self::InvalidStatistics { op_index, .. }
            | Self::RepresentationMismatch { op_index, .. } => *op_index,
            Self::UnsupportedOperator { op_index, .. } => Some(*op_index),
            _ => None,
        }
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationMismatch { .. } => "Q001",
            Self::InvalidStatistics { .. } => "Q002",
            Self::UnsupportedOperator { .. } => "Q003",
            Self::RepresentationMismatch { .. } => "Q004",
            Self::MalformedConfiguration(_) => "Q005",
            Self::ShapeMismatch { .. } => "Q010",
            Self::Io(_) => "Q050",
            Self::Serialization(_) => "Q051",
        }
    }
}
