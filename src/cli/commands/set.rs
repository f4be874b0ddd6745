//! Set command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, SetArgs};
use crate::{ConfigStore, StoreOptions};

pub fn run_set(args: SetArgs, level: LogLevel) -> Result<(), String> {
    let mut config = super::load(&args.config)?;
    config
        .set_enabled(args.slot, args.quantized)
        .map_err(|e| format!("[{}] {e}", e.code()))?;

    // Keep persisted statistics if the input carried them
    let options =
        StoreOptions::new().with_stats(config.records().iter().any(|r| r.stats.is_some()));
    let output = args.output.as_ref().unwrap_or(&args.config);
    ConfigStore::save(&config, output, &options)
        .map_err(|e| format!("[{}] Failed to save {}: {e}", e.code(), output.display()))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Slot {} quantized = {} → {}",
            args.slot,
            args.quantized,
            output.display()
        ),
    );
    Ok(())
}
