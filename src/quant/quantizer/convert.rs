//! Quantize, dequantize and requantize

use super::Quantizer;
use crate::quant::QuantParams;
use crate::tensor::{Representation, Storage, Tensor};
use crate::{Error, Result};

impl Quantizer {
    /// Quantize raw values with given parameters
    pub fn quantize_values(&self, values: &[f32], params: QuantParams) -> Vec<i8> {
        let qmin = self.precision.qmin() as f32;
        let qmax = self.precision.qmax() as f32;

        values
            .iter()
            .map(|&x| ((x / params.scale).round() + params.zero_point as f32).clamp(qmin, qmax) as i8)
            .collect()
    }

    /// Dequantize raw values with given parameters
    pub fn dequantize_values(&self, quantized: &[i8], params: QuantParams) -> Vec<f32> {
        quantized
            .iter()
            .map(|&q| params.dequantize_value(q))
            .collect()
    }

    /// Convert a floating tensor to its int8 representation
    pub fn quantize(&self, tensor: &Tensor, params: QuantParams) -> Result<Tensor> {
        if !params.is_valid() {
            return Err(Error::invalid_stats(format!(
                "scale {} is not a positive finite number",
                params.scale
            )));
        }
        let data = tensor.float_data()?;
        let values = match data.as_slice() {
            Some(slice) => self.quantize_values(slice, params),
            None => self.quantize_values(&data.to_vec(), params),
        };
        Tensor::quantized(values, tensor.shape(), params)
    }

    /// Convert an int8 tensor back to floating point
    pub fn dequantize(&self, tensor: &Tensor) -> Result<Tensor> {
        match tensor.storage() {
            Storage::Quantized { values, params } => {
                let data: Vec<f32> = values.iter().map(|&q| params.dequantize_value(q)).collect();
                Tensor::new(data, tensor.shape())
            }
            Storage::Float(_) => Err(Error::representation(
                Representation::Int8,
                Representation::Fp32,
            )),
        }
    }

    /// Bring a tensor onto `params`, whatever its current representation
    ///
    /// Quantized tensors already on `params` are returned as-is; others go
    /// through floating point.
    pub fn requantize(&self, tensor: &Tensor, params: QuantParams) -> Result<Tensor> {
        match tensor.quant_params() {
            Some(current) if current == params => Ok(tensor.clone()),
            Some(_) => self.quantize(&self.dequantize(tensor)?, params),
            None => self.quantize(tensor, params),
        }
    }
}
