//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, ValidateArgs};
use crate::MixedPrecisionConfiguration;

/// Enabled slots that will fail when inference reaches them
pub fn unready_slots(config: &MixedPrecisionConfiguration) -> Vec<(usize, String)> {
    config
        .records()
        .iter()
        .filter(|r| r.enabled)
        .filter_map(|r| r.input_params().err().map(|e| (r.op_index, e.to_string())))
        .collect()
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    let config = super::load(&args.config)?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "✓ {} loads: {}",
            args.config.display(),
            super::inspect::format_summary(&config)
        ),
    );

    let problems = unready_slots(&config);
    if problems.is_empty() {
        log(level, LogLevel::Normal, "✓ Every quantized slot has a usable scale");
        return Ok(());
    }

    for (_, message) in &problems {
        log(level, LogLevel::Normal, &format!("  ✗ {message}"));
    }
    Err(format!(
        "{} quantized slot(s) cannot run in inference; set \"quantized\": false or re-calibrate",
        problems.len()
    ))
}
