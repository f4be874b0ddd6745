//! Inspect command implementation

use crate::cli::logging::log;
use crate::cli::{InspectArgs, LogLevel};
use crate::quant::{QuantParams, StatisticsAccumulator};
use crate::{MixedPrecisionConfiguration, QuantizationRecord};

fn fmt_params(params: Option<QuantParams>) -> (String, String) {
    match params {
        Some(p) => (format!("{:.6}", p.scale), p.zero_point.to_string()),
        None => ("-".to_string(), "-".to_string()),
    }
}

fn fmt_stats(stats: Option<StatisticsAccumulator>) -> String {
    match stats {
        Some(s) => format!("[{:.4}, {:.4}] x{}", s.min, s.max, s.batches),
        None => "-".to_string(),
    }
}

/// One table row for a slot
pub fn format_record(record: &QuantizationRecord) -> String {
    let (scale, zero_point) = fmt_params(record.params);
    format!(
        "  {:>5}  {:<20} {:<9} {:>10} {:>5}",
        record.op_index,
        record.op_kind.name(),
        if record.enabled { "yes" } else { "no" },
        scale,
        zero_point
    )
}

/// Summary line for a configuration
pub fn format_summary(config: &MixedPrecisionConfiguration) -> String {
    format!(
        "{} slots, {} quantized to {}",
        config.len(),
        config.enabled_count(),
        config.target()
    )
}

pub fn run_inspect(args: InspectArgs, level: LogLevel) -> Result<(), String> {
    let config = super::load(&args.config)?;

    log(level, LogLevel::Normal, &format!("Configuration: {}", args.config.display()));
    log(level, LogLevel::Normal, &format!("  {}", format_summary(&config)));
    log(
        level,
        LogLevel::Normal,
        &format!(
            "\n  {:>5}  {:<20} {:<9} {:>10} {:>5}",
            "slot", "kind", "quantized", "scale", "zp"
        ),
    );
    for record in config.records() {
        log(level, LogLevel::Normal, &format_record(record));
        if level == LogLevel::Verbose {
            let (out_scale, out_zp) = fmt_params(record.output_params);
            log(
                level,
                LogLevel::Verbose,
                &format!(
                    "         input {}  output {}  output scale {out_scale} zp {out_zp}",
                    fmt_stats(record.stats),
                    fmt_stats(record.output_stats)
                ),
            );
        }
    }
    Ok(())
}
