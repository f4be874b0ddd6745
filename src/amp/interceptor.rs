//! Per-operator dispatch on the current running mode.

use super::context::{RuntimeModeContext, SlotPlan};
use super::{OpKind, QuantizationRecord};
use crate::nn::Operator;
use crate::quant::{Quantizer, StatisticsAccumulator};
use crate::tensor::{Representation, Tensor};
use crate::{Error, Result};

/// Hook every intercepted operator invocation goes through
///
/// Each call consumes the next slot of the innermost scope. Errors raised by
/// the quantizer or the kernel carry the slot index.
pub struct OperatorInterceptor;

impl OperatorInterceptor {
    /// Run `op` on `inputs` according to the current mode
    pub fn forward(op: &dyn Operator, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let kind = op.kind();
        match RuntimeModeContext::claim_slot(kind)? {
            SlotPlan::Passthrough => Self::passthrough(op, inputs),
            SlotPlan::Calibrate { frame, op_index } => {
                Self::calibrate(op, kind, inputs, frame, op_index).map_err(|e| e.at_slot(op_index))
            }
            SlotPlan::Infer {
                op_index,
                record,
                target,
            } => Self::infer(op, inputs, &record, Quantizer::new(target))
                .map_err(|e| e.at_slot(op_index)),
        }
    }

    fn passthrough(op: &dyn Operator, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        expect_all(inputs, Representation::Fp32)?;
        op.forward_float(inputs)
    }

    fn calibrate(
        op: &dyn Operator,
        kind: OpKind,
        inputs: &[Tensor],
        frame: usize,
        op_index: usize,
    ) -> Result<Vec<Tensor>> {
        expect_all(inputs, Representation::Fp32)?;
        let input_stats = StatisticsAccumulator::from_tensors(inputs);

        let outputs = op.forward_float(inputs)?;
        expect_all(&outputs, Representation::Fp32)?;
        let output_stats = StatisticsAccumulator::from_tensors(&outputs);

        RuntimeModeContext::record_statistics(frame, op_index, kind, input_stats, output_stats)?;
        Ok(outputs)
    }

    fn infer(
        op: &dyn Operator,
        inputs: &[Tensor],
        record: &QuantizationRecord,
        quantizer: Quantizer,
    ) -> Result<Vec<Tensor>> {
        if !record.enabled {
            let outputs = if inputs.iter().all(Tensor::is_float) {
                op.forward_float(inputs)?
            } else {
                let floats = inputs
                    .iter()
                    .map(|t| match t.representation() {
                        Representation::Int8 => quantizer.dequantize(t),
                        Representation::Fp32 => Ok(t.clone()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                op.forward_float(&floats)?
            };
            expect_all(&outputs, Representation::Fp32)?;
            return Ok(outputs);
        }

        let kernel = op.quantized().ok_or_else(|| Error::UnsupportedOperator {
            op_index: record.op_index,
            kind: record.op_kind.name().to_string(),
        })?;
        let params = record.input_params()?;

        let quantized = inputs
            .iter()
            .map(|t| quantizer.requantize(t, params))
            .collect::<Result<Vec<_>>>()?;
        let outputs = kernel.forward_quantized(&quantized, record.output_params, &quantizer)?;
        expect_all(&outputs, Representation::Int8)?;
        Ok(outputs)
    }
}

fn expect_all(tensors: &[Tensor], expected: Representation) -> Result<()> {
    match tensors.iter().find(|t| t.representation() != expected) {
        Some(t) => Err(Error::representation(expected, t.representation())),
        None => Ok(()),
    }
}
