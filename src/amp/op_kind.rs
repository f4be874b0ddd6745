//! Operator kind tags recorded per slot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad operator category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    Convolution,
    Linear,
    Pooling,
    Elementwise,
    Recurrent,
}

/// Operator kind stored in a slot and checked against the firing operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Conv2d,
    Linear,
    MaxPool2d,
    AvgPool2d,
    AdaptiveAvgPool2d,
    Relu,
    Sigmoid,
    Add,
    Lstm,
}

impl OpKind {
    /// Every known kind
    pub fn all() -> [OpKind; 9] {
        [
            OpKind::Conv2d,
            OpKind::Linear,
            OpKind::MaxPool2d,
            OpKind::AvgPool2d,
            OpKind::AdaptiveAvgPool2d,
            OpKind::Relu,
            OpKind::Sigmoid,
            OpKind::Add,
            OpKind::Lstm,
        ]
    }

    /// Tag as written in the configuration file
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Conv2d => "conv2d",
            OpKind::Linear => "linear",
            OpKind::MaxPool2d => "max_pool2d",
            OpKind::AvgPool2d => "avg_pool2d",
            OpKind::AdaptiveAvgPool2d => "adaptive_avg_pool2d",
            OpKind::Relu => "relu",
            OpKind::Sigmoid => "sigmoid",
            OpKind::Add => "add",
            OpKind::Lstm => "lstm",
        }
    }

    pub fn category(&self) -> OpCategory {
        match self {
            OpKind::Conv2d => OpCategory::Convolution,
            OpKind::Linear => OpCategory::Linear,
            OpKind::MaxPool2d | OpKind::AvgPool2d | OpKind::AdaptiveAvgPool2d => {
                OpCategory::Pooling
            }
            OpKind::Relu | OpKind::Sigmoid | OpKind::Add => OpCategory::Elementwise,
            OpKind::Lstm => OpCategory::Recurrent,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OpKind::all()
            .into_iter()
            .find(|k| k.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown operator kind: {s}"))
    }
}
