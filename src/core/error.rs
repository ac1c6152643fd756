//! Error taxonomy for configuration, provisioning, secrets and reporting

use thiserror::Error;

/// Malformed workflow configuration. Fatal: raised before any job runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Matrix declares no axes")]
    NoAxes,

    #[error("Axis '{0}' has no values")]
    EmptyAxis(String),

    #[error("Duplicate axis name: {0}")]
    DuplicateAxis(String),

    #[error("Axis '{axis}' lists value '{value}' more than once")]
    DuplicateValue { axis: String, value: String },

    #[error("Exclusion #{0} is empty")]
    EmptyExclusion(usize),

    #[error("Exclusion references unknown axis '{0}'")]
    UnknownAxis(String),

    #[error("Exclusion references value '{value}' not present in axis '{axis}'")]
    UnknownValue { axis: String, value: String },

    #[error("Matrix is too large: the product of its axis sizes overflows")]
    MatrixTooLarge,

    #[error("Workflow has no steps")]
    NoSteps,

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step name '{0}' is reserved")]
    ReservedStep(String),

    #[error("max_parallel must be at least 1")]
    InvalidMaxParallel,

    #[error("provision.max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Unsupported value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Environment setup failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Setup command exited with code {exit_code}: {stderr}")]
    SetupFailed { exit_code: i32, stderr: String },

    #[error("Provisioning failed: {0}")]
    Unavailable(String),

    #[error("Provisioning gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// A command could not be run inside an environment
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("Failed to spawn command: {0}")]
    Spawn(String),

    #[error("Failed to read '{path}': {reason}")]
    Read { path: String, reason: String },
}

/// Secret lookup failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),
}

/// Upload to the external reporting service failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReportingError {
    #[error("Transient reporting error: {0}")]
    Transient(String),

    #[error("Reporting error: {0}")]
    Fatal(String),
}
