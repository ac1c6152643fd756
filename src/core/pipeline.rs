//! Workflow domain model

use crate::core::{
    axis::{AxisSet, PartialSpec},
    config::WorkflowConfig,
    context::JobContext,
    error::ConfigError,
    job::JobSpec,
    state::Trigger,
    step::{referenced_secrets, PipelineStep, StepDefaults},
};
use crate::execution::expander;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Dispatch policy across jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// None = every job may run at once
    pub max_parallel: Option<usize>,
    pub fail_fast: bool,
}

/// How environments are acquired for each job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPolicy {
    /// Setup command template, run inside the fresh environment
    pub setup: Option<String>,

    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub retry_delay: Duration,

    pub timeout_secs: u64,
}

impl Default for ProvisionPolicy {
    fn default() -> Self {
        Self {
            setup: None,
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            timeout_secs: 1800,
        }
    }
}

impl ProvisionPolicy {
    /// Backoff before attempt `attempt` (2-based: the first retry)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }
}

/// Where artifacts go after the run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportingPolicy {
    pub directory: Option<PathBuf>,
    pub fail_on_error: bool,
}

/// A workflow definition: the matrix plus the pipeline every job runs
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Accepted events (empty = all)
    pub triggers: Vec<String>,

    /// Global variables available to step templates
    pub variables: HashMap<String, String>,

    pub axes: AxisSet,
    pub exclusions: Vec<PartialSpec>,

    /// Jobs matching any of these may fail without failing the run
    pub continue_on_error: Vec<PartialSpec>,

    /// Steps run after provisioning, in order
    pub steps: Vec<PipelineStep>,

    pub strategy: Strategy,
    pub provision: ProvisionPolicy,
    pub reporting: ReportingPolicy,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        let steps = config
            .steps
            .iter()
            .map(|step_config| PipelineStep::from_config(step_config, &defaults))
            .collect();

        let provision = ProvisionPolicy {
            setup: config.provision.setup.clone(),
            max_attempts: config.provision.max_attempts,
            retry_delay: Duration::from_millis(config.provision.retry_delay_ms),
            timeout_secs: config
                .provision
                .timeout_secs
                .unwrap_or(ProvisionPolicy::default().timeout_secs),
        };

        Ok(Workflow {
            name: config.name.clone(),
            triggers: config.triggers.clone(),
            variables: config.variables_as_string_map(),
            axes: config.axis_set()?,
            exclusions: config.exclusions()?,
            continue_on_error: config.continue_on_error_rules()?,
            steps,
            strategy: Strategy {
                max_parallel: config.strategy.max_parallel,
                fail_fast: config.strategy.fail_fast,
            },
            provision,
            reporting: ReportingPolicy {
                directory: config.reporting.directory.as_ref().map(PathBuf::from),
                fail_on_error: config.reporting.fail_on_error,
            },
        })
    }

    /// Check whether this workflow runs for `event`
    pub fn accepts(&self, event: &str) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|t| t == event)
    }

    /// Expand the matrix and flag jobs allowed to continue on error
    pub fn jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let mut jobs = expander::expand(&self.axes, &self.exclusions)?;
        for job in &mut jobs {
            job.continue_on_error = self.continue_on_error.iter().any(|rule| rule.matches(job));
        }
        Ok(jobs)
    }

    /// Every secret any step binds
    pub fn secret_names(&self) -> Vec<&str> {
        referenced_secrets(&self.steps)
    }

    /// Base rendering context for a run
    pub fn context(&self, trigger: &Trigger) -> JobContext {
        let mut context = JobContext::new().with_trigger(trigger.clone());
        for (key, value) in &self.variables {
            context.set_variable(key.clone(), value.clone());
        }
        context
    }
}
