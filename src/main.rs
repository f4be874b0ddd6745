//! automix CLI
//!
//! Inspect and hand-edit mixed-precision configurations between a
//! calibration run and an inference run.
//!
//! # Usage
//!
//! ```bash
//! # Show the slot table
//! automix inspect configure.json
//!
//! # Run slot 3 in fp32 from now on
//! automix set configure.json --slot 3 --quantized false
//!
//! # Check every quantized slot has a usable scale
//! automix validate configure.yaml
//! ```

use automix::cli::{run_command, Cli, LogLevel};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = LogLevel::from_flags(cli.quiet, cli.verbose);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.tracing_directive())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
