//! CLI module for the stackfab tool.
//!
//! This module provides the command-line interface for planning,
//! allocating and tearing down clusters.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
