//! CLI module for custodia
//!
//! Provides the command-line interface:
//! - health: run the check battery and write a report
//! - snapshot / list / verify / restore / prune: snapshot lifecycle
//! - schedule: run the calendar jobs until interrupted

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{health, list, prune, restore, run, schedule, snapshot, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
