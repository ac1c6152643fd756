//! Job outcomes and run results

use crate::core::{
    job::JobSpec,
    state::{JobStatus, RunStatus, StepStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// What happened to one step of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,

    /// Process exit code, when the command ran to completion
    pub exit_code: Option<i32>,

    /// Captured output with secret values redacted
    pub stdout: String,
    pub stderr: String,

    /// Number of attempts (only provisioning retries)
    pub attempts: u32,

    pub duration_ms: u64,

    /// Failure was tolerated
    pub continue_on_error: bool,

    pub error: Option<String>,
}

impl StepResult {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            attempts: 0,
            duration_ms: 0,
            continue_on_error: false,
            error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// A file produced by a step (e.g. a coverage report)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Declared path, relative to the job environment
    pub path: String,

    /// Step that produced it
    pub step: String,

    /// File contents with secret values redacted
    pub content: String,
}

impl Artifact {
    /// Final path component, used as upload file name
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .unwrap_or("artifact")
    }
}

/// Artifact tagged with the job that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedArtifact {
    pub job_index: usize,
    pub job_key: String,
    pub tags: BTreeMap<String, String>,
    pub artifact: Artifact,
}

/// Terminal result of running the pipeline for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job: JobSpec,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
    pub artifacts: Vec<Artifact>,

    /// Provisioning attempts made (0 when cancelled)
    pub provision_attempts: u32,

    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// Outcome of a job that was never dispatched
    pub fn cancelled(job: JobSpec) -> Self {
        Self {
            job,
            status: JobStatus::Cancelled,
            steps: Vec::new(),
            artifacts: Vec::new(),
            provision_attempts: 0,
            error: None,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    /// Outcome of a job whose task died without reporting
    pub fn crashed(job: JobSpec, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            error: Some(error.into()),
            ..Self::cancelled(job)
        }
    }

    /// Failed and not allowed to continue on error
    pub fn counts_as_failure(&self) -> bool {
        self.status == JobStatus::Failed && !self.job.continue_on_error
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn duration_ms(&self) -> u64 {
        self.started_at
            .and_then(|start| self.finished_at.signed_duration_since(start).to_std().ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Aggregation of every job outcome of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,

    /// Sorted by expansion index
    pub outcomes: Vec<JobOutcome>,

    pub artifacts: Vec<TaggedArtifact>,

    /// Upload failures, logged but only fatal with `fail_on_error`
    pub reporting_errors: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Outcome of the job with the given expansion index
    pub fn outcome(&self, index: usize) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.job.index == index)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
