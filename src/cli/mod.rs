//! CLI for the hand-edit path of mixed-precision configurations.

mod args;
mod commands;
mod logging;

pub use args::{parse_args, Cli, Command, InspectArgs, SetArgs, ValidateArgs};
pub use commands::run_command;
pub use logging::LogLevel;
