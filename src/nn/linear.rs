//! Fully connected layer: `y = x Wᵀ + b`

use ndarray::{Array1, Array2, ArrayView2};

use super::{output_params, single, Operator, QuantizedKernel};
use crate::amp::OpKind;
use crate::quant::{QuantParams, Quantizer};
use crate::tensor::Tensor;
use crate::{Error, Result};

/// Linear layer with weight `[out_features, in_features]`
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Option<Array1<f32>>,
}

impl Linear {
    pub fn new(
        weight: Vec<f32>,
        in_features: usize,
        out_features: usize,
        bias: Option<Vec<f32>>,
    ) -> Result<Self> {
        let weight_len = weight.len();
        let weight = Array2::from_shape_vec((out_features, in_features), weight).map_err(|_| {
            Error::ShapeMismatch {
                expected: vec![out_features, in_features],
                actual: vec![weight_len],
            }
        })?;
        let bias = match bias {
            Some(b) if b.len() != out_features => {
                return Err(Error::ShapeMismatch {
                    expected: vec![out_features],
                    actual: vec![b.len()],
                })
            }
            b => b.map(Array1::from),
        };
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Rows of the input and the output shape
    fn layout(&self, input: &Tensor) -> Result<(usize, Vec<usize>)> {
        let in_features = self.in_features();
        match input.shape().split_last() {
            Some((&last, lead)) if last == in_features => {
                let mut shape = lead.to_vec();
                shape.push(self.out_features());
                Ok((input.len() / in_features.max(1), shape))
            }
            _ => Err(Error::ShapeMismatch {
                expected: vec![in_features],
                actual: input.shape().to_vec(),
            }),
        }
    }

    fn add_bias(&self, y: &mut Array2<f32>) {
        if let Some(b) = &self.bias {
            *y += b;
        }
    }
}

impl Operator for Linear {
    fn kind(&self) -> OpKind {
        OpKind::Linear
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (rows, shape) = self.layout(x)?;
        let data = x.float_data()?;
        let x2: ArrayView2<f32> = data
            .view()
            .into_shape_with_order((rows, self.in_features()))
            .map_err(|_| Error::ShapeMismatch {
                expected: vec![rows, self.in_features()],
                actual: x.shape().to_vec(),
            })?;

        let mut y = x2.dot(&self.weight.t());
        self.add_bias(&mut y);
        Ok(vec![Tensor::new(y.iter().copied().collect(), &shape)?])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for Linear {
    /// Integer matmul with i32 accumulation
    ///
    /// The weight is quantized symmetric per-tensor; the accumulator is
    /// rescaled by `s_x * s_w`, biased in floating point and quantized onto
    /// the output grid.
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (rows, shape) = self.layout(x)?;
        let (qx, x_params) = x.quantized_data()?;

        let weight: Vec<f32> = self.weight.iter().copied().collect();
        let w_params = quantizer
            .derive_from_values(&weight)
            .unwrap_or(QuantParams::new(1.0 / quantizer.precision().representable_max(), 0));
        let qw = quantizer.quantize_values(&weight, w_params);

        let in_features = self.in_features();
        let out_features = self.out_features();
        let rescale = x_params.scale * w_params.scale;

        let mut y = Array2::<f32>::zeros((rows, out_features));
        for r in 0..rows {
            for o in 0..out_features {
                let acc: i32 = (0..in_features)
                    .map(|k| {
                        (i32::from(qx[r * in_features + k]) - x_params.zero_point)
                            * i32::from(qw[o * in_features + k])
                    })
                    .sum();
                y[[r, o]] = acc as f32 * rescale;
            }
        }
        self.add_bias(&mut y);

        let real: Vec<f32> = y.iter().copied().collect();
        let params = output_params(&real, output, quantizer, x_params);
        let values = quantizer.quantize_values(&real, params);
        Ok(vec![Tensor::quantized(values, &shape, params)?])
    }
}
