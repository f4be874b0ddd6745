//! CLI command implementations

mod inspect;
mod set;
mod validate;


use std::path::Path;

use crate::cli::{Cli, Command, LogLevel};
use crate::{ConfigStore, MixedPrecisionConfiguration, TargetPrecision};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.quiet, cli.verbose);

    match cli.command {
        Command::Inspect(args) => inspect::run_inspect(args, log_level),
        Command::Set(args) => set::run_set(args, log_level),
        Command::Validate(args) => validate::run_validate(args, log_level),
    }
}

fn load(path: &Path) -> Result<MixedPrecisionConfiguration, String> {
    ConfigStore::load(path, TargetPrecision::default())
        .map_err(|e| format!("[{}] Failed to load {}: {e}", e.code(), path.display()))
}
