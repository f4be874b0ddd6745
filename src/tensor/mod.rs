//! Tagged tensor values exchanged with the execution engine
//!
//! A [`Tensor`] is either floating (`Fp32`) or quantized (`Int8` plus the
//! parameters it was quantized with). The tag is structural: code asks
//! [`Tensor::representation`] instead of inspecting values.

mod representation;


pub use representation::Representation;

use ndarray::Array1;

use crate::quant::{QuantParams, TargetPrecision};
use crate::{Error, Result};

/// Backing storage of a tensor
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    /// Floating values
    Float(Array1<f32>),
    /// Quantized values together with their affine parameters
    Quantized {
        values: Array1<i8>,
        params: QuantParams,
    },
}

/// Flat row-major tensor with a shape and a representation tag
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    storage: Storage,
    shape: Vec<usize>,
}

fn check_shape(len: usize, shape: &[usize]) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected == len {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            expected: shape.to_vec(),
            actual: vec![len],
        })
    }
}

impl Tensor {
    /// Create a floating tensor, checking that `data` fills `shape`
    pub fn new(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        check_shape(data.len(), shape)?;
        Ok(Self {
            storage: Storage::Float(Array1::from(data)),
            shape: shape.to_vec(),
        })
    }

    /// Create a 1-D floating tensor
    pub fn from_vec(data: Vec<f32>) -> Self {
        let shape = vec![data.len()];
        Self {
            storage: Storage::Float(Array1::from(data)),
            shape,
        }
    }

    /// Create a quantized tensor from raw int8 values
    ///
    /// The zero point must itself be an int8 value.
    pub fn quantized(values: Vec<i8>, shape: &[usize], params: QuantParams) -> Result<Self> {
        check_shape(values.len(), shape)?;
        if !params.fits(TargetPrecision::Int8) {
            return Err(Error::invalid_stats(format!(
                "zero point {} is outside the int8 range",
                params.zero_point
            )));
        }
        Ok(Self {
            storage: Storage::Quantized {
                values: Array1::from(values),
                params,
            },
            shape: shape.to_vec(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Float(data) => data.len(),
            Storage::Quantized { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Current representation tag
    pub fn representation(&self) -> Representation {
        match self.storage {
            Storage::Float(_) => Representation::Fp32,
            Storage::Quantized { .. } => Representation::Int8,
        }
    }

    pub fn is_quantized(&self) -> bool {
        self.representation().is_quantized()
    }

    pub fn is_float(&self) -> bool {
        !self.is_quantized()
    }

    /// Floating values, or a representation mismatch for quantized tensors
    pub fn float_data(&self) -> Result<&Array1<f32>> {
        match &self.storage {
            Storage::Float(data) => Ok(data),
            Storage::Quantized { .. } => Err(Error::representation(
                Representation::Fp32,
                Representation::Int8,
            )),
        }
    }

    /// Quantized values and parameters, or a representation mismatch for floating tensors
    pub fn quantized_data(&self) -> Result<(&Array1<i8>, QuantParams)> {
        match &self.storage {
            Storage::Quantized { values, params } => Ok((values, *params)),
            Storage::Float(_) => Err(Error::representation(
                Representation::Int8,
                Representation::Fp32,
            )),
        }
    }

    /// Parameters of a quantized tensor
    pub fn quant_params(&self) -> Option<QuantParams> {
        match &self.storage {
            Storage::Quantized { params, .. } => Some(*params),
            Storage::Float(_) => None,
        }
    }

    /// Values as f32, dequantizing when needed
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.storage {
            Storage::Float(data) => data.to_vec(),
            Storage::Quantized { values, params } => {
                values.iter().map(|&q| params.dequantize_value(q)).collect()
            }
        }
    }

    /// Same storage under a new shape with the same element count
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        check_shape(self.len(), shape)?;
        Ok(Self {
            storage: self.storage.clone(),
            shape: shape.to_vec(),
        })
    }
}
