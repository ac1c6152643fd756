//! Workflow configuration from YAML

use crate::core::{
    axis::{Axis, AxisSet, PartialSpec},
    error::ConfigError,
    pipeline::Workflow,
    step::PROVISION_STEP,
};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events this workflow runs for (empty = every event)
    #[serde(default, rename = "on")]
    pub triggers: Vec<String>,

    /// Global variables available to step templates
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Build matrix
    pub matrix: MatrixConfig,

    /// Dispatch policy
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Environment provisioning
    #[serde(default)]
    pub provision: ProvisionConfig,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Pipeline steps, run in order after provisioning
    pub steps: Vec<StepConfig>,

    /// Artifact forwarding
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Matrix axes, exclusions and continue-on-error rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Axes in declaration order
    pub axes: Vec<AxisConfig>,

    /// Partial job specifications removed from the product
    #[serde(default)]
    pub exclude: Vec<Mapping>,

    /// Partial job specifications whose failures don't fail the run
    #[serde(default)]
    pub continue_on_error: Vec<Mapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    pub name: String,

    /// Scalar values; numbers and booleans are stringified
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Maximum concurrently running jobs (None = unbounded)
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Stop dispatching after the first failure
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_parallel: None,
            fail_fast: default_fail_fast(),
        }
    }
}

fn default_fail_fast() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Command run inside a fresh environment to make it ready
    #[serde(default)]
    pub setup: Option<String>,

    /// Total provisioning attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each further retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout for the setup command (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            setup: None,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Shell command template
    pub run: String,

    /// Environment variables for the command
    #[serde(default)]
    pub env: BTreeMap<String, EnvValueConfig>,

    /// Keep going when this step fails
    #[serde(default)]
    pub continue_on_error: bool,

    /// Timeout for this step (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// File produced by this step, forwarded to reporting
    #[serde(default)]
    pub artifact: Option<String>,
}

/// Env value: a literal string or `{ secret: NAME }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValueConfig {
    Secret { secret: String },
    Literal(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Directory artifacts are uploaded to (None = discard)
    #[serde(default)]
    pub directory: Option<String>,

    /// Upload failures fail the run
    #[serde(default)]
    pub fail_on_error: bool,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name == PROVISION_STEP {
                return Err(ConfigError::ReservedStep(step.name.clone()));
            }
            if !seen.insert(&step.name) {
                return Err(ConfigError::DuplicateStep(step.name.clone()));
            }
        }

        if self.strategy.max_parallel == Some(0) {
            return Err(ConfigError::InvalidMaxParallel);
        }
        if self.provision.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }

        let axes = self.axis_set()?;
        axes.validate()?;

        for (i, exclusion) in self.exclusions()?.iter().enumerate() {
            if exclusion.is_empty() {
                return Err(ConfigError::EmptyExclusion(i));
            }
            exclusion.validate_against(&axes)?;
        }
        for rule in self.continue_on_error_rules()? {
            rule.validate_against(&axes)?;
        }

        Ok(())
    }

    /// Axes with values converted to strings
    pub fn axis_set(&self) -> Result<AxisSet, ConfigError> {
        let axes = self
            .matrix
            .axes
            .iter()
            .map(|axis| {
                let values = axis
                    .values
                    .iter()
                    .map(|v| scalar_to_string(&axis.name, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Axis::new(axis.name.clone(), values))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(AxisSet::new(axes))
    }

    pub fn exclusions(&self) -> Result<Vec<PartialSpec>, ConfigError> {
        self.matrix.exclude.iter().map(mapping_to_partial).collect()
    }

    pub fn continue_on_error_rules(&self) -> Result<Vec<PartialSpec>, ConfigError> {
        self.matrix
            .continue_on_error
            .iter()
            .map(mapping_to_partial)
            .collect()
    }

    /// Get variables as string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    // Fallback: render as YAML
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow, ConfigError> {
        Workflow::from_config(self)
    }
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "axis values must be scalars".to_string(),
        }),
    }
}

fn mapping_to_partial(mapping: &Mapping) -> Result<PartialSpec, ConfigError> {
    let entries = mapping
        .iter()
        .map(|(k, v)| {
            let axis = k.as_str().ok_or_else(|| ConfigError::InvalidValue {
                key: format!("{:?}", k),
                reason: "axis names must be strings".to_string(),
            })?;
            Ok((axis.to_string(), scalar_to_string(axis, v)?))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    Ok(PartialSpec::new(entries))
}
