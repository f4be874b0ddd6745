//! Serializable form of one slot

use serde::{Deserialize, Serialize};

use crate::amp::{OpKind, QuantizationRecord};
use crate::quant::{QuantParams, StatisticsAccumulator, TargetPrecision};
use crate::{Error, Result};

/// One element of the persisted slot list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecordEntry {
    pub op_index: usize,
    pub op_kind: String,
    pub quantized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_point: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_zero_point: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatisticsAccumulator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_stats: Option<StatisticsAccumulator>,
}

impl RecordEntry {
    /// Snapshot a record; parameters are written only for enabled slots
    pub fn from_record(record: &QuantizationRecord, include_stats: bool) -> Self {
        let params = record.params.filter(|_| record.enabled);
        let output_params = record.output_params.filter(|_| record.enabled);

        Self {
            op_index: record.op_index,
            op_kind: record.op_kind.name().to_string(),
            quantized: record.enabled,
            scale: params.map(|p| p.scale),
            zero_point: params.map(|p| p.zero_point),
            output_scale: output_params.map(|p| p.scale),
            output_zero_point: output_params.map(|p| p.zero_point),
            stats: record.stats.filter(|_| include_stats),
            output_stats: record.output_stats.filter(|_| include_stats),
        }
    }

    /// Validate and convert back into a record
    ///
    /// Fields are applied as given. An enabled slot without a scale is
    /// accepted here and rejected when inference reaches it.
    pub fn into_record(self, target: TargetPrecision) -> Result<QuantizationRecord> {
        let index = self.op_index;
        let op_kind: OpKind = self
            .op_kind
            .parse()
            .map_err(|e: String| malformed(index, &e))?;

        let params = pair_params(index, target, "scale", self.scale, self.zero_point)?;
        let output_params = pair_params(
            index,
            target,
            "output_scale",
            self.output_scale,
            self.output_zero_point,
        )?;

        for stats in [&self.stats, &self.output_stats].into_iter().flatten() {
            if !stats.is_consistent() {
                return Err(malformed(
                    index,
                    &format!("statistics range [{}, {}] is inconsistent", stats.min, stats.max),
                ));
            }
        }

        Ok(QuantizationRecord {
            op_index: index,
            op_kind,
            enabled: self.quantized,
            stats: self.stats,
            params,
            output_stats: self.output_stats,
            output_params,
        })
    }
}

fn malformed(op_index: usize, message: &str) -> Error {
    Error::MalformedConfiguration(format!("slot {op_index}: {message}"))
}

fn pair_params(
    op_index: usize,
    target: TargetPrecision,
    field: &str,
    scale: Option<f32>,
    zero_point: Option<i32>,
) -> Result<Option<QuantParams>> {
    match (scale, zero_point) {
        (None, None) => Ok(None),
        (Some(scale), Some(zero_point)) => {
            let params = QuantParams::new(scale, zero_point);
            if !params.is_valid() {
                return Err(malformed(
                    op_index,
                    &format!("{field} {scale} is not a positive finite number"),
                ));
            }
            if !params.fits(target) {
                return Err(malformed(
                    op_index,
                    &format!(
                        "zero point {zero_point} of {field} is outside the {target} range [{}, {}]",
                        target.qmin(),
                        target.qmax()
                    ),
                ));
            }
            Ok(Some(params))
        }
        (Some(_), None) => Err(malformed(op_index, &format!("{field} given without its zero point"))),
        (None, Some(_)) => Err(malformed(op_index, &format!("zero point given without {field}"))),
    }
}
