//! Reference execution engine
//!
//! Operators expose a floating forward pass and, when they have one, an
//! int8 kernel. [`Sequential`] chains them through
//! [`OperatorInterceptor`](crate::OperatorInterceptor) so every layer
//! consumes one slot in execution order.

mod elementwise;
mod linear;
mod pool;

pub use elementwise::{Add, ReLU, Sigmoid};
pub use linear::Linear;
pub use pool::{AvgPool2d, MaxPool2d};

use crate::amp::{OpKind, OperatorInterceptor};
use crate::quant::{QuantParams, Quantizer};
use crate::tensor::Tensor;
use crate::{Error, Result};

/// One intercepted operator
pub trait Operator {
    /// Kind recorded in the operator's slot
    fn kind(&self) -> OpKind;

    /// Full-precision forward pass
    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;

    /// Low-precision kernel, if the operator has one
    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        None
    }
}

/// Int8 execution path of an operator
pub trait QuantizedKernel {
    /// Run on int8 inputs and return int8 outputs
    ///
    /// `output` is the requantization target recorded at calibration time;
    /// with `None` the kernel picks its own output parameters.
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>>;
}

/// A stack of operators applied in sequence
pub struct Sequential {
    layers: Vec<Box<dyn Operator>>,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Operator>>) -> Self {
        Self { layers }
    }

    pub fn push(&mut self, layer: Box<dyn Operator>) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Kinds of the layers in execution order
    pub fn kinds(&self) -> Vec<OpKind> {
        self.layers.iter().map(|l| l.kind()).collect()
    }

    /// Run every layer through the interceptor, feeding outputs forward
    pub fn forward(&self, input: Tensor) -> Result<Vec<Tensor>> {
        self.layers
            .iter()
            .try_fold(vec![input], |x, layer| {
                OperatorInterceptor::forward(layer.as_ref(), &x)
            })
    }
}

/// The single input of a unary operator
pub(crate) fn single(inputs: &[Tensor]) -> Result<&Tensor> {
    match inputs {
        [x] => Ok(x),
        _ => Err(Error::ShapeMismatch {
            expected: vec![1],
            actual: vec![inputs.len()],
        }),
    }
}

/// Output parameters for a kernel result
///
/// Uses the recorded target when present, otherwise derives from the
/// produced values and falls back to `fallback` for an all-zero result.
pub(crate) fn output_params(
    values: &[f32],
    output: Option<QuantParams>,
    quantizer: &Quantizer,
    fallback: QuantParams,
) -> QuantParams {
    output.unwrap_or_else(|| quantizer.derive_from_values(values).unwrap_or(fallback))
}

/// Move an int8 result onto the recorded output parameters, if any
pub(crate) fn retarget(
    tensor: Tensor,
    output: Option<QuantParams>,
    quantizer: &Quantizer,
) -> Result<Tensor> {
    match output {
        Some(params) => quantizer.requantize(&tensor, params),
        None => Ok(tensor),
    }
}
