//! Command-line argument types

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// automix: inspect and edit int8 mixed-precision configurations
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "automix")]
#[command(version)]
#[command(about = "Inspect, validate and hand-edit per-operator int8 quantization configurations")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the slot table of a configuration
    Inspect(InspectArgs),

    /// Enable or disable quantization for one slot
    Set(SetArgs),

    /// Check that a configuration loads and can drive inference
    Validate(ValidateArgs),
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Path to configuration file (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the set command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SetArgs {
    /// Path to configuration file (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Slot index (0-based position in execution order)
    #[arg(short, long)]
    pub slot: usize,

    /// New value of the slot's `quantized` flag
    #[arg(long, action = ArgAction::Set)]
    pub quantized: bool,

    /// Write to this path instead of overwriting CONFIG
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to configuration file (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
