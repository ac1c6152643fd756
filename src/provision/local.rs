//! Local provisioner - one temporary working directory per job, commands
//! run as subprocesses

use crate::core::{EnvironmentError, JobSpec, ProvisionError};
use crate::provision::{
    CommandOutput, Environment, EnvironmentProvisioner, LocalProvisionerConfig, Shell,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// Provisioner creating isolated local working directories
#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    config: LocalProvisionerConfig,
}

impl LocalProvisioner {
    pub fn new(config: LocalProvisionerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EnvironmentProvisioner for LocalProvisioner {
    async fn provision(&self, job: &JobSpec) -> Result<Box<dyn Environment>, ProvisionError> {
        let prefix = format!("matrix-ci-{}-", job.key());
        let dir = match &self.config.base_dir {
            Some(base) => {
                std::fs::create_dir_all(base).map_err(|e| {
                    ProvisionError::Unavailable(format!(
                        "Failed to create {}: {}",
                        base.display(),
                        e
                    ))
                })?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(base)
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir(),
        }
        .map_err(|e| ProvisionError::Unavailable(format!("Failed to create workdir: {}", e)))?;

        debug!("Provisioned {} in {}", job, dir.path().display());

        Ok(Box::new(LocalEnvironment {
            dir,
            source_dir: self.config.source_dir.clone(),
            shell: self.config.shell,
            scrubbed_env: self.config.scrubbed_env.clone(),
        }))
    }
}

/// A job's working directory on the local machine
#[derive(Debug)]
pub struct LocalEnvironment {
    dir: TempDir,
    source_dir: PathBuf,
    shell: Shell,
    scrubbed_env: Vec<String>,
}

impl LocalEnvironment {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    async fn run_command(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, EnvironmentError> {
        let (program, args) = self.shell.command();
        debug!("Spawning {} in {}", program, self.dir.path().display());

        let mut cmd = Command::new(program);
        cmd.args(args).arg(command).current_dir(self.dir.path());
        for name in &self.scrubbed_env {
            cmd.env_remove(name);
        }

        let output = cmd
            .env("MATRIX_SOURCE_DIR", &self.source_dir)
            .envs(env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EnvironmentError::Spawn(format!("{}: {}", program, e)))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn read_file(&self, path: &str) -> Result<String, EnvironmentError> {
        tokio::fs::read_to_string(self.dir.path().join(path))
            .await
            .map_err(|e| EnvironmentError::Read {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn teardown(&self) {
        debug!("Tearing down {}", self.dir.path().display());
    }
}
