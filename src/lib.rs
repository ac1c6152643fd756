//! matrix-ci - expand a build matrix and run a pipeline for every job

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod provision;
pub mod reporting;
pub mod secrets;

// Re-export commonly used types
pub use core::{
    Axis, AxisSet, JobOutcome, JobSpec, JobStatus, PartialSpec, PipelineStep, RunResult,
    RunStatus, Trigger, Workflow,
};
pub use execution::{expand, ExecutionEngine, ExecutionEvent, PipelineRunner, SchedulingStrategy};
pub use provision::{Environment, EnvironmentProvisioner};
pub use reporting::ReportUploader;
pub use secrets::SecretProvider;
