//! Elementwise operators

use super::{output_params, retarget, single, Operator, QuantizedKernel};
use crate::amp::OpKind;
use crate::quant::{QuantParams, Quantizer};
use crate::tensor::Tensor;
use crate::{Error, Result};

fn map_float(x: &Tensor, f: impl Fn(f32) -> f32) -> Result<Tensor> {
    let data = x.float_data()?;
    Tensor::new(data.iter().map(|&v| f(v)).collect(), x.shape())
}

/// `max(x, 0)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl Operator for ReLU {
    fn kind(&self) -> OpKind {
        OpKind::Relu
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![map_float(single(inputs)?, |v| v.max(0.0))?])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for ReLU {
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (values, params) = x.quantized_data()?;
        let floor = params.zero_point.clamp(
            quantizer.precision().qmin(),
            quantizer.precision().qmax(),
        ) as i8;

        let relu = Tensor::quantized(values.iter().map(|&q| q.max(floor)).collect(), x.shape(), params)?;
        Ok(vec![retarget(relu, output, quantizer)?])
    }
}

/// Logistic function; floating point only
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Operator for Sigmoid {
    fn kind(&self) -> OpKind {
        OpKind::Sigmoid
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![map_float(single(inputs)?, |v| 1.0 / (1.0 + (-v).exp()))?])
    }
}

/// Elementwise sum of two tensors of the same shape
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Add {
    fn operands(inputs: &[Tensor]) -> Result<(&Tensor, &Tensor)> {
        match inputs {
            [a, b] if a.shape() == b.shape() => Ok((a, b)),
            [a, b] => Err(Error::ShapeMismatch {
                expected: a.shape().to_vec(),
                actual: b.shape().to_vec(),
            }),
            _ => Err(Error::ShapeMismatch {
                expected: vec![2],
                actual: vec![inputs.len()],
            }),
        }
    }
}

impl Operator for Add {
    fn kind(&self) -> OpKind {
        OpKind::Add
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let (a, b) = Self::operands(inputs)?;
        let sum = a.float_data()? + b.float_data()?;
        Ok(vec![Tensor::new(sum.to_vec(), a.shape())?])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for Add {
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = Self::operands(inputs)?;
        let (qa, pa) = a.quantized_data()?;
        let (qb, pb) = b.quantized_data()?;

        let real: Vec<f32> = qa
            .iter()
            .zip(qb.iter())
            .map(|(&x, &y)| {
                (i32::from(x) - pa.zero_point) as f32 * pa.scale
                    + (i32::from(y) - pb.zero_point) as f32 * pb.scale
            })
            .collect();

        let params = output_params(&real, output, quantizer, pa);
        Ok(vec![Tensor::quantized(
            quantizer.quantize_values(&real, params),
            a.shape(),
            params,
        )?])
    }
}
