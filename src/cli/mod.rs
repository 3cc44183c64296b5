//! CLI module for the schema control tool.
//!
//! This module provides the command-line interface for planning schema
//! changes against a live database.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
