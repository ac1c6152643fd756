//! CLI command definitions

use crate::core::Strategy;
use crate::execution::SchedulingStrategy;
use clap::{ArgAction, Args};
use std::path::PathBuf;
use uuid::Uuid;

/// Print the expanded jobs
#[derive(Debug, Args, Clone)]
pub struct ExpandCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the matrix
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Maximum jobs running at once (overrides strategy.max_parallel)
    #[arg(long, value_parser = parse_max_parallel)]
    pub max_parallel: Option<usize>,

    /// Stop starting jobs after the first failure (overrides strategy.fail_fast)
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub fail_fast: Option<bool>,

    /// Triggering event
    #[arg(long, default_value = "manual")]
    pub event: String,

    /// Source revision being built
    #[arg(long, default_value = "HEAD")]
    pub revision: String,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Directory artifacts are written to (overrides reporting.directory)
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Scheduling strategy and fail-fast flag after applying overrides
    pub fn strategy(&self, configured: &Strategy) -> (SchedulingStrategy, bool) {
        let max_parallel = self.max_parallel.or(configured.max_parallel);
        (
            SchedulingStrategy::from_max_parallel(max_parallel),
            self.fail_fast.unwrap_or(configured.fail_fast),
        )
    }
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run by ID
    #[arg(long, conflicts_with_all = ["workflow", "workflows"])]
    pub run: Option<Uuid>,

    /// List workflows with recorded runs instead of runs
    #[arg(long)]
    pub workflows: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

fn parse_max_parallel(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
