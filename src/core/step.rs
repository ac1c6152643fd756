//! Pipeline step domain model

use crate::core::{config::{EnvValueConfig, StepConfig}, context::JobContext};

/// Name of the implicit first step of every job
pub const PROVISION_STEP: &str = "provision";

/// How an environment variable gets its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvBinding {
    /// Literal value, may contain `{{ ... }}` placeholders
    Literal(String),
    /// Name of a secret looked up at run time. Never rendered or logged.
    Secret(String),
}

/// A single step in a job's pipeline
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Unique step name (install, test, report, ...)
    pub name: String,

    /// Shell command template
    pub run: String,

    /// Environment bindings, in declaration order
    pub env: Vec<(String, EnvBinding)>,

    /// A failure of this step does not abort the job
    pub continue_on_error: bool,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Path (relative to the environment) of a file this step produces
    pub artifact: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
        }
    }
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run: run.into(),
            env: Vec::new(),
            continue_on_error: false,
            timeout_secs: StepDefaults::default().timeout_secs,
            artifact: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), EnvBinding::Literal(value.into())));
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.env.push((key.into(), EnvBinding::Secret(secret.into())));
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_artifact(mut self, path: impl Into<String>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        let env = config
            .env
            .iter()
            .map(|(key, value)| {
                let binding = match value {
                    EnvValueConfig::Literal(v) => EnvBinding::Literal(v.clone()),
                    EnvValueConfig::Secret { secret } => EnvBinding::Secret(secret.clone()),
                };
                (key.clone(), binding)
            })
            .collect();

        PipelineStep {
            name: config.name.clone(),
            run: config.run.clone(),
            env,
            continue_on_error: config.continue_on_error,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            artifact: config.artifact.clone(),
        }
    }

    /// Render the command for a job
    pub fn render_command(&self, context: &JobContext) -> String {
        context.render(&self.run)
    }

    /// Names of the secrets this step needs
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.env.iter().filter_map(|(_, binding)| match binding {
            EnvBinding::Secret(name) => Some(name.as_str()),
            EnvBinding::Literal(_) => None,
        })
    }
}

/// Distinct secret names referenced anywhere in `steps`, sorted
pub fn referenced_secrets(steps: &[PipelineStep]) -> Vec<&str> {
    let mut names: Vec<&str> = steps.iter().flat_map(|s| s.secret_names()).collect();
    names.sort_unstable();
    names.dedup();
    names
}
