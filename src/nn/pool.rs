//! 2-D pooling over NCHW tensors
//!
//! Windows may extend into symmetric zero padding. With `ceil_mode` the
//! output keeps a partial window at the end of each axis as long as it
//! starts inside the input or the leading padding.

use ndarray::Array1;

use super::{retarget, single, Operator, QuantizedKernel};
use crate::amp::OpKind;
use crate::quant::{QuantParams, Quantizer};
use crate::tensor::Tensor;
use crate::{Error, Result};

/// Window geometry shared by the pooling operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    kernel: usize,
    stride: usize,
    padding: usize,
    ceil_mode: bool,
}

impl Window {
    fn new(kernel: usize, stride: usize) -> Self {
        Self {
            kernel: kernel.max(1),
            stride: stride.max(1),
            padding: 0,
            ceil_mode: false,
        }
    }

    /// Padding is capped at half the kernel
    fn with_padding(self, padding: usize) -> Self {
        Self {
            padding: padding.min(self.kernel / 2),
            ..self
        }
    }

    fn with_ceil_mode(self, ceil_mode: bool) -> Self {
        Self { ceil_mode, ..self }
    }

    /// Number of windows along an axis of `size` elements
    fn extent(&self, size: usize) -> Option<usize> {
        let span = (size + 2 * self.padding).checked_sub(self.kernel)?;
        let steps = if self.ceil_mode {
            span.div_ceil(self.stride)
        } else {
            span / self.stride
        };
        // The last window has to start before the trailing padding
        if self.ceil_mode && steps * self.stride >= size + self.padding {
            Some(steps)
        } else {
            Some(steps + 1)
        }
    }

    /// Input range `[lo, hi)` covered by window `o`, plus its length
    /// counting padding
    fn span(&self, o: usize, size: usize) -> (usize, usize, usize) {
        let start = o * self.stride;
        let end = (start + self.kernel).min(size + 2 * self.padding);
        let lo = start.saturating_sub(self.padding).min(size);
        let hi = end.saturating_sub(self.padding).min(size);
        (lo, hi, end - start)
    }

    /// Output shape for an NCHW input
    fn output_shape(&self, shape: &[usize]) -> Result<[usize; 4]> {
        let dims = match *shape {
            [n, c, h, w] => self.extent(h).zip(self.extent(w)).map(|(oh, ow)| [n, c, oh, ow]),
            _ => None,
        };
        dims.ok_or_else(|| Error::ShapeMismatch {
            expected: vec![0, 0, self.kernel, self.kernel],
            actual: shape.to_vec(),
        })
    }

    /// Reduce every window of `data` with `reduce`
    ///
    /// `reduce` gets the in-bounds values and the window size counting
    /// padded positions.
    fn apply<T: Copy, R>(
        &self,
        data: &Array1<T>,
        shape: &[usize],
        mut reduce: impl FnMut(&[T], usize) -> R,
    ) -> Result<(Vec<R>, [usize; 4])> {
        let out = self.output_shape(shape)?;
        let [n, c, oh, ow] = out;
        let (h, w) = (shape[2], shape[3]);

        let mut window = Vec::with_capacity(self.kernel * self.kernel);
        let mut result = Vec::with_capacity(n * c * oh * ow);
        for plane in 0..n * c {
            let base = plane * h * w;
            for oy in 0..oh {
                let (y0, y1, rows) = self.span(oy, h);
                for ox in 0..ow {
                    let (x0, x1, cols) = self.span(ox, w);
                    window.clear();
                    for y in y0..y1 {
                        let row = base + y * w;
                        window.extend((x0..x1).map(|x| data[row + x]));
                    }
                    result.push(reduce(&window, rows * cols));
                }
            }
        }
        Ok((result, out))
    }
}

/// Max over each window; padded positions never win
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    window: Window,
}

impl MaxPool2d {
    pub fn new(kernel: usize, stride: usize) -> Self {
        Self {
            window: Window::new(kernel, stride),
        }
    }

    /// Symmetric padding, capped at half the kernel
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.window = self.window.with_padding(padding);
        self
    }

    pub fn with_ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.window = self.window.with_ceil_mode(ceil_mode);
        self
    }
}

impl Operator for MaxPool2d {
    fn kind(&self) -> OpKind {
        OpKind::MaxPool2d
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (values, shape) = self.window.apply(x.float_data()?, x.shape(), |w, _| {
            w.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        })?;
        Ok(vec![Tensor::new(values, &shape)?])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for MaxPool2d {
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (data, params) = x.quantized_data()?;
        let (values, shape) = self
            .window
            .apply(data, x.shape(), |w, _| w.iter().copied().max().unwrap_or(i8::MIN))?;
        let pooled = Tensor::quantized(values, &shape, params)?;
        Ok(vec![retarget(pooled, output, quantizer)?])
    }
}

/// Mean over each window
///
/// Padded positions count as zeros in the divisor unless
/// `count_include_pad` is turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvgPool2d {
    window: Window,
    count_include_pad: bool,
}

impl AvgPool2d {
    pub fn new(kernel: usize, stride: usize) -> Self {
        Self {
            window: Window::new(kernel, stride),
            count_include_pad: true,
        }
    }

    /// Symmetric padding, capped at half the kernel
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.window = self.window.with_padding(padding);
        self
    }

    pub fn with_ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.window = self.window.with_ceil_mode(ceil_mode);
        self
    }

    pub fn with_count_include_pad(mut self, count_include_pad: bool) -> Self {
        self.count_include_pad = count_include_pad;
        self
    }

    fn divisor(&self, in_bounds: usize, padded: usize) -> usize {
        let count = if self.count_include_pad {
            padded
        } else {
            in_bounds
        };
        count.max(1)
    }
}

impl Operator for AvgPool2d {
    fn kind(&self) -> OpKind {
        OpKind::AvgPool2d
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (values, shape) = self.window.apply(x.float_data()?, x.shape(), |w, padded| {
            w.iter().sum::<f32>() / self.divisor(w.len(), padded) as f32
        })?;
        Ok(vec![Tensor::new(values, &shape)?])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for AvgPool2d {
    /// Averages offsets from the zero point in i32, rounding half away from
    /// zero; padding contributes a zero offset
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let x = single(inputs)?;
        let (data, params) = x.quantized_data()?;
        let (qmin, qmax) = (quantizer.precision().qmin(), quantizer.precision().qmax());

        let (values, shape) = self.window.apply(data, x.shape(), |w, padded| {
            let sum: i32 = w.iter().map(|&q| i32::from(q) - params.zero_point).sum();
            let mean = (sum as f32 / self.divisor(w.len(), padded) as f32).round() as i32;
            (mean + params.zero_point).clamp(qmin, qmax) as i8
        })?;
        let pooled = Tensor::quantized(values, &shape, params)?;
        Ok(vec![retarget(pooled, output, quantizer)?])
    }
}
