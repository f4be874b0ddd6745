//! Tests for scopes, slot dispatch and configuration lifecycle

use super::*;
use crate::nn::{Add, Linear, MaxPool2d, Operator, QuantizedKernel, ReLU, Sequential, Sigmoid};
use crate::quant::{QuantParams, Quantizer, StatisticsAccumulator, TargetPrecision};
use crate::tensor::{Representation, Tensor};
use crate::{Error, Result};
use approx::assert_abs_diff_eq;
use std::cell::RefCell;
use std::sync::Arc;

fn empty() -> MixedPrecisionConfiguration {
    MixedPrecisionConfiguration::new(TargetPrecision::Int8)
}

fn linear() -> Linear {
    Linear::new(vec![1.0], 1, 1, None).unwrap()
}

fn calibrate(model: &Sequential, inputs: &[Tensor]) -> MixedPrecisionConfiguration {
    let mut conf = empty();
    {
        let mut scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        for (i, x) in inputs.iter().enumerate() {
            if i > 0 {
                scope.next_run().unwrap();
            }
            model.forward(x.clone()).unwrap();
        }
        scope.exit().unwrap();
    }
    conf
}

/// Operator whose float path always fails
struct Failing;

impl Operator for Failing {
    fn kind(&self) -> OpKind {
        OpKind::Conv2d
    }

    fn forward_float(&self, _inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        Err(Error::ShapeMismatch {
            expected: vec![1],
            actual: vec![0],
        })
    }
}

/// Recurrent-style cell: `(x, h) -> (x + h, x - h)`
///
/// The int8 path records the parameters each input arrives with.
#[derive(Default)]
struct SumDiffCell {
    seen: RefCell<Vec<QuantParams>>,
}

impl Operator for SumDiffCell {
    fn kind(&self) -> OpKind {
        OpKind::Lstm
    }

    fn forward_float(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let [x, h] = inputs else {
            return Err(Error::ShapeMismatch {
                expected: vec![2],
                actual: vec![inputs.len()],
            });
        };
        let (xs, hs) = (x.float_data()?, h.float_data()?);
        Ok(vec![
            Tensor::new((xs + hs).to_vec(), x.shape())?,
            Tensor::new((xs - hs).to_vec(), x.shape())?,
        ])
    }

    fn quantized(&self) -> Option<&dyn QuantizedKernel> {
        Some(self)
    }
}

impl QuantizedKernel for SumDiffCell {
    fn forward_quantized(
        &self,
        inputs: &[Tensor],
        output: Option<QuantParams>,
        quantizer: &Quantizer,
    ) -> Result<Vec<Tensor>> {
        let floats = inputs
            .iter()
            .map(|t| {
                let (_, params) = t.quantized_data()?;
                self.seen.borrow_mut().push(params);
                quantizer.dequantize(t)
            })
            .collect::<Result<Vec<_>>>()?;
        let params = output.unwrap_or(QuantParams::new(1.0, 0));
        self.forward_float(&floats)?
            .iter()
            .map(|y| quantizer.quantize(y, params))
            .collect()
    }
}

// ========================================================================
// SCOPES
// ========================================================================

#[test]
fn test_default_mode_is_disabled() {
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    assert_eq!(RuntimeModeContext::depth(), 0);
}

#[test]
fn test_scope_restores_on_exit() {
    let mut conf = empty();
    {
        let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Calibration);
        assert_eq!(scope.depth(), 0);
        scope.exit().unwrap();
    }
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    assert_eq!(RuntimeModeContext::depth(), 0);
}

#[test]
fn test_nested_calibration_inside_disabled_restores_exactly() {
    let outer = RuntimeModeContext::disabled();
    let mut conf = empty();
    {
        let inner = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        assert_eq!(inner.depth(), 1);
        assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Calibration);
        inner.exit().unwrap();
    }
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    assert_eq!(RuntimeModeContext::depth(), 1);
    drop(outer);
    assert_eq!(RuntimeModeContext::depth(), 0);
}

#[test]
fn test_disabled_inside_calibration_skips_slots() {
    let mut conf = empty();
    {
        let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        OperatorInterceptor::forward(&linear(), &[Tensor::from_vec(vec![1.0])]).unwrap();
        {
            let _off = RuntimeModeContext::disabled();
            OperatorInterceptor::forward(&linear(), &[Tensor::from_vec(vec![9.0])]).unwrap();
        }
        assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Calibration);
        OperatorInterceptor::forward(&ReLU, &[Tensor::from_vec(vec![1.0])]).unwrap();
        scope.exit().unwrap();
    }
    assert_eq!(conf.len(), 2);
    assert_eq!(conf.get(1).unwrap().op_kind, OpKind::Relu);
}

#[test]
fn test_failure_inside_scope_restores_mode_and_configuration() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(Failing)]);
    let mut conf = empty();

    let outcome: Result<()> = (|| {
        let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration)?;
        model.forward(Tensor::from_vec(vec![2.0]))?;
        scope.exit()
    })();

    assert!(matches!(
        outcome.unwrap_err(),
        Error::ShapeMismatch { .. }
    ));
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    // Partial statistics stay; nothing was finalized
    assert_eq!(conf.len(), 2);
    assert!(conf.get(0).unwrap().stats.is_some());
    assert!(conf.get(0).unwrap().params.is_none());
}

#[test]
fn test_panic_inside_scope_restores_mode() {
    let result = std::panic::catch_unwind(|| {
        let mut conf = empty();
        let _scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        panic!("forward pass exploded");
    });
    assert!(result.is_err());
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    assert_eq!(RuntimeModeContext::depth(), 0);
}

#[test]
fn test_outer_release_discards_leaked_inner_scopes() {
    let outer = RuntimeModeContext::disabled();
    let inner = RuntimeModeContext::disabled();
    drop(outer);
    assert_eq!(RuntimeModeContext::depth(), 0);
    // Inner frame is already gone
    assert!(inner.exit().is_err());
}

#[test]
fn test_inference_with_empty_configuration_rejected() {
    let mut conf = empty();
    let err = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap_err();
    assert!(matches!(err, Error::ConfigurationMismatch { .. }));
    assert_eq!(RuntimeModeContext::depth(), 0);

    let err = RuntimeModeContext::enter_frozen(Arc::new(empty())).unwrap_err();
    assert_eq!(err.code(), "Q001");
}

#[test]
fn test_cursor_resets_per_scope() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let x = Tensor::from_vec(vec![1.0]);
    let mut conf = calibrate(&model, &[x.clone()]);

    for _ in 0..2 {
        let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
        assert_eq!(RuntimeModeContext::current_op_index(), 0);
        model.forward(x.clone()).unwrap();
        scope.exit().unwrap();
    }
    assert_eq!(conf.len(), 2);
    assert_eq!(conf.get(0).unwrap().stats.unwrap().batches, 3);
}

// ========================================================================
// CALIBRATION
// ========================================================================

#[test]
fn test_calibration_output_is_unchanged_float() {
    let model = Sequential::new(vec![
        Box::new(Linear::new(vec![0.3, -0.7], 2, 1, Some(vec![0.05])).unwrap()),
        Box::new(Sigmoid),
    ]);
    let x = Tensor::from_vec(vec![1.25, -0.5]);
    let reference = model.forward(x.clone()).unwrap();

    let mut conf = empty();
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    let calibrated = model.forward(x).unwrap();
    scope.exit().unwrap();

    assert_eq!(calibrated, reference);
    assert!(calibrated[0].is_float());
}

#[test]
fn test_calibration_exit_derives_parameters() {
    let model = Sequential::new(vec![Box::new(linear())]);
    let x = Tensor::new(vec![0.0, 1.0, -2.0, 1.5, -1.5, 3.0], &[6, 1]).unwrap();
    let conf = calibrate(&model, &[x]);

    let record = conf.get(0).unwrap();
    let params = record.params.unwrap();
    assert_abs_diff_eq!(params.scale, 3.0 / 127.0, epsilon = 1e-7);
    assert_eq!(params.zero_point, 0);
    assert!(record.output_params.is_some());
}

#[test]
fn test_calibration_rejects_quantized_input() {
    let mut conf = empty();
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    let q = Tensor::quantized(vec![1], &[1], QuantParams::new(0.1, 0)).unwrap();
    let err = OperatorInterceptor::forward(&linear(), &[q]).unwrap_err();
    drop(scope);

    assert!(matches!(
        err,
        Error::RepresentationMismatch {
            op_index: Some(0),
            expected: Representation::Fp32,
            actual: Representation::Int8,
        }
    ));
}

#[test]
fn test_disabled_mode_rejects_quantized_input() {
    let q = Tensor::quantized(vec![1], &[1], QuantParams::new(0.1, 0)).unwrap();
    let err = OperatorInterceptor::forward(&ReLU, &[q]).unwrap_err();
    assert!(matches!(err, Error::RepresentationMismatch { op_index: None, .. }));
}

#[test]
fn test_calibration_topology_change_is_mismatch() {
    let mut conf = calibrate(
        &Sequential::new(vec![Box::new(linear())]),
        &[Tensor::from_vec(vec![1.0])],
    );
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    let err = OperatorInterceptor::forward(&ReLU, &[Tensor::from_vec(vec![1.0])]).unwrap_err();
    drop(scope);
    assert!(matches!(
        err,
        Error::ConfigurationMismatch {
            op_index: Some(0),
            ..
        }
    ));
}

#[test]
fn test_accumulation_is_idempotent() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let batches = vec![
        Tensor::from_vec(vec![0.5, -1.0]).reshape(&[2, 1]).unwrap(),
        Tensor::from_vec(vec![2.0, 0.25]).reshape(&[2, 1]).unwrap(),
    ];

    let once = calibrate(&model, &batches);
    let twice = calibrate(&model, &[batches.clone(), batches.clone()].concat());
    let reversed: Vec<Tensor> = batches.iter().rev().cloned().collect();
    let reordered = calibrate(&model, &reversed);

    for conf in [&twice, &reordered] {
        for (a, b) in once.records().iter().zip(conf.records()) {
            assert_eq!(a.params, b.params);
            assert_eq!(a.output_params, b.output_params);
        }
    }
}

#[test]
fn test_recalibration_keeps_disabled_slot_untouched() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let mut conf = calibrate(&model, &[Tensor::from_vec(vec![1.0])]);
    conf.set_enabled(1, false).unwrap();
    let before = conf.get(1).unwrap().params;

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    model.forward(Tensor::from_vec(vec![-4.0])).unwrap();
    scope.exit().unwrap();

    let record = conf.get(1).unwrap();
    assert!(!record.enabled);
    assert_eq!(record.params, before);
    // Slot 0 picked up the wider range
    assert_abs_diff_eq!(conf.get(0).unwrap().params.unwrap().scale, 4.0 / 127.0, epsilon = 1e-7);
}

#[test]
fn test_degenerate_statistics_leave_slot_without_params() {
    let mut conf = empty();
    conf.record_observation(0, OpKind::Relu, StatisticsAccumulator::from_values(&[0.0]), None)
        .unwrap();
    let problems = conf.finalize();

    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].op_index(), Some(0));
    assert!(conf.get(0).unwrap().params.is_none());
}

#[test]
fn test_record_observation_skipping_slots_is_mismatch() {
    let mut conf = empty();
    let err = conf.record_observation(2, OpKind::Linear, None, None).unwrap_err();
    assert!(matches!(err, Error::ConfigurationMismatch { .. }));
    assert!(conf.set_enabled(0, false).is_err());
}

#[test]
fn test_from_records_requires_contiguous_indices() {
    let records = vec![QuantizationRecord::new(1, OpKind::Linear)];
    let err = MixedPrecisionConfiguration::from_records(TargetPrecision::Int8, records).unwrap_err();
    assert!(matches!(err, Error::MalformedConfiguration(_)));
}

// ========================================================================
// INFERENCE
// ========================================================================

#[test]
fn test_inference_quantizes_enabled_slots() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let x = Tensor::from_vec(vec![0.5, -1.0, 1.5]).reshape(&[3, 1]).unwrap();
    let mut conf = calibrate(&model, &[x.clone()]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = model.forward(x).unwrap();
    scope.exit().unwrap();

    assert!(y[0].is_quantized());
    let v = y[0].to_f32_vec();
    assert_abs_diff_eq!(v[0], 0.5, epsilon = 0.02);
    assert_abs_diff_eq!(v[1], 0.0, epsilon = 0.02);
    assert_abs_diff_eq!(v[2], 1.5, epsilon = 0.02);
}

#[test]
fn test_inference_does_not_mutate_configuration() {
    let model = Sequential::new(vec![Box::new(linear())]);
    let x = Tensor::from_vec(vec![1.0]);
    let mut conf = calibrate(&model, &[x.clone()]);
    let snapshot = conf.clone();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    model.forward(Tensor::from_vec(vec![100.0])).unwrap();
    scope.exit().unwrap();

    assert_eq!(conf, snapshot);
}

#[test]
fn test_inference_disabled_slot_is_plain_float() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let x = Tensor::from_vec(vec![0.7, -0.3]).reshape(&[2, 1]).unwrap();
    let reference = model.forward(x.clone()).unwrap();
    let mut conf = calibrate(&model, &[x.clone()]);
    conf.set_enabled(0, false).unwrap();
    conf.set_enabled(1, false).unwrap();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = model.forward(x).unwrap();
    scope.exit().unwrap();

    assert!(y[0].is_float());
    assert_eq!(y, reference);
}

#[test]
fn test_inference_disabled_slot_dequantizes_its_input() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let x = Tensor::from_vec(vec![0.7, -0.3]).reshape(&[2, 1]).unwrap();
    let mut conf = calibrate(&model, &[x.clone()]);
    conf.set_enabled(1, false).unwrap();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = model.forward(x).unwrap();
    scope.exit().unwrap();

    assert!(y[0].is_float());
    assert_abs_diff_eq!(y[0].to_f32_vec()[0], 0.7, epsilon = 0.01);
}

#[test]
fn test_inference_unsupported_operator() {
    let model = Sequential::new(vec![Box::new(linear()), Box::new(Sigmoid)]);
    let x = Tensor::from_vec(vec![1.0]);
    let mut conf = calibrate(&model, &[x.clone()]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let err = model.forward(x.clone()).unwrap_err();
    drop(scope);
    assert!(matches!(
        err,
        Error::UnsupportedOperator { op_index: 1, ref kind } if kind == "sigmoid"
    ));

    // Rectified by disabling the slot
    conf.set_enabled(1, false).unwrap();
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = model.forward(x).unwrap();
    scope.exit().unwrap();
    assert!(y[0].is_float());
}

#[test]
fn test_inference_enabled_without_scale_is_invalid_statistics() {
    let mut record = QuantizationRecord::new(0, OpKind::Linear);
    record.enabled = true;
    let mut conf =
        MixedPrecisionConfiguration::from_records(TargetPrecision::Int8, vec![record]).unwrap();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let err = OperatorInterceptor::forward(&linear(), &[Tensor::from_vec(vec![1.0])]).unwrap_err();
    drop(scope);
    assert!(matches!(
        err,
        Error::InvalidStatistics {
            op_index: Some(0),
            ..
        }
    ));
}

#[test]
fn test_inference_degenerate_slot_is_invalid_statistics() {
    let model = Sequential::new(vec![Box::new(linear())]);
    let mut conf = calibrate(&model, &[Tensor::from_vec(vec![0.0])]);
    assert!(conf.get(0).unwrap().params.is_none());

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let err = model.forward(Tensor::from_vec(vec![1.0])).unwrap_err();
    drop(scope);
    assert_eq!(err.code(), "Q002");
}

#[test]
fn test_inference_too_many_operators_is_mismatch() {
    let short = Sequential::new(vec![Box::new(linear())]);
    let long = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let mut conf = calibrate(&short, &[Tensor::from_vec(vec![1.0])]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let err = long.forward(Tensor::from_vec(vec![1.0])).unwrap_err();
    drop(scope);
    assert!(matches!(
        err,
        Error::ConfigurationMismatch {
            op_index: Some(1),
            ..
        }
    ));
}

#[test]
fn test_inference_too_few_operators_fails_on_exit() {
    let long = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
    let short = Sequential::new(vec![Box::new(linear())]);
    let mut conf = calibrate(&long, &[Tensor::from_vec(vec![1.0])]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    short.forward(Tensor::from_vec(vec![1.0])).unwrap();
    let err = scope.exit().unwrap_err();

    assert!(matches!(err, Error::ConfigurationMismatch { .. }));
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
    assert_eq!(conf.len(), 2);
}

#[test]
fn test_inference_kind_mismatch() {
    let mut conf = calibrate(
        &Sequential::new(vec![Box::new(linear())]),
        &[Tensor::from_vec(vec![1.0])],
    );
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let x = Tensor::new(vec![1.0; 4], &[1, 1, 2, 2]).unwrap();
    let err = OperatorInterceptor::forward(&MaxPool2d::new(2, 2), &[x]).unwrap_err();
    drop(scope);
    assert!(matches!(err, Error::ConfigurationMismatch { .. }));
}

#[test]
fn test_inference_multiple_runs_in_one_scope() {
    let model = Sequential::new(vec![Box::new(linear())]);
    let mut conf = calibrate(&model, &[Tensor::from_vec(vec![2.0])]);

    let mut scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    model.forward(Tensor::from_vec(vec![1.0])).unwrap();
    scope.next_run().unwrap();
    model.forward(Tensor::from_vec(vec![-1.0])).unwrap();
    scope.next_run().unwrap();
    scope.exit().unwrap();
}

#[test]
fn test_frozen_configuration_shared_across_threads() {
    let model_conf = {
        let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
        calibrate(&model, &[Tensor::from_vec(vec![-1.0, 1.0]).reshape(&[2, 1]).unwrap()])
    };
    let frozen = Arc::new(model_conf);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let conf = Arc::clone(&frozen);
            std::thread::spawn(move || {
                let model = Sequential::new(vec![Box::new(linear()), Box::new(ReLU)]);
                let scope = RuntimeModeContext::enter_frozen(conf).unwrap();
                let y = model.forward(Tensor::from_vec(vec![i as f32 * 0.25])).unwrap();
                scope.exit().unwrap();
                (y[0].is_quantized(), y[0].to_f32_vec()[0])
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (quantized, value) = handle.join().unwrap();
        assert!(quantized);
        assert_abs_diff_eq!(value, i as f32 * 0.25, epsilon = 0.02);
    }
    assert_eq!(RuntimeModeContext::depth(), 0);
}

#[test]
fn test_requantizes_mismatched_int8_input() {
    let model = Sequential::new(vec![Box::new(linear())]);
    let mut conf = calibrate(&model, &[Tensor::from_vec(vec![1.0])]);

    let q = Tensor::quantized(vec![50], &[1], QuantParams::new(0.01, 0)).unwrap();
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = OperatorInterceptor::forward(&linear(), &[q]).unwrap();
    scope.exit().unwrap();

    assert!(y[0].is_quantized());
    assert_abs_diff_eq!(y[0].to_f32_vec()[0], 0.5, epsilon = 0.01);
}

#[test]
fn test_out_of_range_zero_point_fails_instead_of_overflowing() {
    let mut record = QuantizationRecord::new(0, OpKind::Linear);
    record.params = Some(QuantParams::new(0.02, i32::MIN));
    let mut conf =
        MixedPrecisionConfiguration::from_records(TargetPrecision::Int8, vec![record]).unwrap();
    let model = Sequential::new(vec![Box::new(linear())]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let err = model.forward(Tensor::from_vec(vec![1.0])).unwrap_err();
    drop(scope);

    assert_eq!(err.code(), "Q002");
    assert_eq!(err.op_index(), Some(0));
    assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
}

#[test]
fn test_calibration_over_saturated_batch_count() {
    let mut conf = ConfigStore::from_str(
        r#"[{"op_index": 0, "op_kind": "relu", "quantized": true,
             "stats": {"min": -1.0, "max": 1.0, "batches": 18446744073709551615}}]"#,
        ConfigFormat::Json,
        TargetPrecision::Int8,
    )
    .unwrap();
    let model = Sequential::new(vec![Box::new(ReLU)]);

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    model.forward(Tensor::from_vec(vec![2.0, -0.5])).unwrap();
    scope.exit().unwrap();

    let record = conf.get(0).unwrap();
    let stats = record.stats.unwrap();
    assert_eq!(stats.batches, u64::MAX);
    assert_abs_diff_eq!(stats.min, -1.0);
    assert_abs_diff_eq!(stats.max, 2.0);
    assert_abs_diff_eq!(record.params.unwrap().scale, 2.0 / 127.0, epsilon = 1e-6);
}

// ========================================================================
// MULTI-TENSOR OPERATORS
// ========================================================================

#[test]
fn test_calibration_merges_every_input_of_add() {
    let a = Tensor::from_vec(vec![-1.0, 2.0]);
    let b = Tensor::from_vec(vec![0.5, -3.0]);
    let mut conf = empty();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    let y = OperatorInterceptor::forward(&Add, &[a, b]).unwrap();
    scope.exit().unwrap();

    assert_eq!(y[0].to_f32_vec(), vec![-0.5, -1.0]);
    let record = conf.get(0).unwrap();
    assert_eq!(record.op_kind, OpKind::Add);

    let stats = record.stats.unwrap();
    assert_abs_diff_eq!(stats.min, -3.0);
    assert_abs_diff_eq!(stats.max, 2.0);
    assert_eq!(stats.batches, 1);
    assert_abs_diff_eq!(record.params.unwrap().scale, 3.0 / 127.0, epsilon = 1e-6);

    let output_stats = record.output_stats.unwrap();
    assert_abs_diff_eq!(output_stats.min, -1.0);
    assert_abs_diff_eq!(output_stats.max, -0.5);
}

#[test]
fn test_two_output_operator_calibration_and_inference() {
    let cell = SumDiffCell::default();
    let x = Tensor::from_vec(vec![1.0, -2.0, 3.0]);
    let h = Tensor::from_vec(vec![0.5, 0.5, -1.0]);
    let mut conf = empty();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    let reference = OperatorInterceptor::forward(&cell, &[x.clone(), h.clone()]).unwrap();
    scope.exit().unwrap();

    assert_eq!(reference.len(), 2);
    assert!(reference.iter().all(Tensor::is_float));
    let record = conf.get(0).unwrap().clone();
    let output_stats = record.output_stats.unwrap();
    // Union of (x + h) = [1.5, -1.5, 2] and (x - h) = [0.5, -2.5, 4]
    assert_abs_diff_eq!(output_stats.min, -2.5);
    assert_abs_diff_eq!(output_stats.max, 4.0);
    assert_abs_diff_eq!(record.stats.unwrap().min, -2.0);
    assert_abs_diff_eq!(record.stats.unwrap().max, 3.0);
    let slot_params = record.params.unwrap();
    let out_params = record.output_params.unwrap();
    assert_abs_diff_eq!(out_params.scale, 4.0 / 127.0, epsilon = 1e-6);

    // Second run feeds the hidden state as int8 on foreign parameters
    let h_q = Tensor::quantized(vec![4, 4, -2], &[3], QuantParams::new(0.25, 2)).unwrap();
    let mut scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let float_run = OperatorInterceptor::forward(&cell, &[x.clone(), h]).unwrap();
    scope.next_run().unwrap();
    let mixed_run = OperatorInterceptor::forward(&cell, &[x, h_q]).unwrap();
    scope.exit().unwrap();

    for outputs in [&float_run, &mixed_run] {
        assert_eq!(outputs.len(), 2);
        for (y, r) in outputs.iter().zip(reference.iter()) {
            assert_eq!(y.representation(), Representation::Int8);
            assert_eq!(y.quant_params(), Some(out_params));
            for (a, b) in y.to_f32_vec().iter().zip(r.to_f32_vec().iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 0.05);
            }
        }
    }

    let seen = cell.seen.borrow();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|p| *p == slot_params));
}

#[test]
fn test_add_requantizes_mixed_inputs_onto_slot() {
    let a = Tensor::from_vec(vec![1.0, -2.0]);
    let b = Tensor::from_vec(vec![0.5, 1.5]);
    let mut conf = empty();

    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration).unwrap();
    OperatorInterceptor::forward(&Add, &[a.clone(), b]).unwrap();
    scope.exit().unwrap();
    let out_params = conf.get(0).unwrap().output_params.unwrap();

    // 0.5 and 1.5 on a grid the slot never saw
    let b_q = Tensor::quantized(vec![8, 18], &[2], QuantParams::new(0.1, 3)).unwrap();
    let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Inference).unwrap();
    let y = OperatorInterceptor::forward(&Add, &[a, b_q]).unwrap();
    scope.exit().unwrap();

    assert!(y[0].is_quantized());
    assert_eq!(y[0].quant_params(), Some(out_params));
    let v = y[0].to_f32_vec();
    assert_abs_diff_eq!(v[0], 1.5, epsilon = 0.03);
    assert_abs_diff_eq!(v[1], -0.5, epsilon = 0.03);
}
