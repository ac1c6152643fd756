//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ExpandCommand, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Build-matrix runner
#[derive(Debug, Parser, Clone)]
#[command(name = "matrix-ci")]
#[command(version)]
#[command(about = "Expand a build matrix and run a pipeline for every job", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to workflow configuration file
    #[arg(short, long, global = true, default_value = "matrix.yml")]
    pub config: String,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the jobs the matrix expands to
    Expand(ExpandCommand),

    /// Run the pipeline for every job
    Run(RunCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
