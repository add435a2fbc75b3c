//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the giotto binary.

mod commands;
mod run;

pub use commands::{Cli, Commands};
pub use run::{GenerateArgs, generate, list_runs, resume, status};
