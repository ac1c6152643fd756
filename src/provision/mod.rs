//! Environment provisioning - where job steps actually run

pub mod config;
pub mod local;

use crate::core::{EnvironmentError, JobSpec, ProvisionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use config::{LocalProvisionerConfig, Shell};
pub use local::{LocalEnvironment, LocalProvisioner};

/// Result of running one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// An isolated, ready execution environment for one job
#[async_trait]
pub trait Environment: Send + Sync {
    /// Run a shell command with extra environment variables
    async fn run_command(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, EnvironmentError>;

    /// Read a file produced inside the environment
    async fn read_file(&self, path: &str) -> Result<String, EnvironmentError>;

    /// Release the environment
    async fn teardown(&self) {}
}

/// Trait for environment provisioning - allows for different backends
#[async_trait]
pub trait EnvironmentProvisioner: Send + Sync {
    /// Acquire an environment keyed by the job's axis values
    async fn provision(&self, job: &JobSpec) -> Result<Box<dyn Environment>, ProvisionError>;
}
