//! Job specification - one concrete combination of axis values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single axis binding inside a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisValue {
    pub axis: String,
    pub value: String,
}

/// One value chosen per declared axis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobSpec {
    /// Position in expansion order
    pub index: usize,

    /// Axis bindings, in axis declaration order
    pub values: Vec<AxisValue>,

    /// A failure of this job does not fail the run
    #[serde(default)]
    pub continue_on_error: bool,
}

impl JobSpec {
    pub fn new(index: usize, values: Vec<(String, String)>) -> Self {
        Self {
            index,
            values: values
                .into_iter()
                .map(|(axis, value)| AxisValue { axis, value })
                .collect(),
            continue_on_error: false,
        }
    }

    /// Value bound to `axis`, if the axis exists
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.axis == axis)
            .map(|v| v.value.as_str())
    }

    /// Human readable label, e.g. `(ubuntu-latest, 3.9)`
    pub fn label(&self) -> String {
        let values: Vec<&str> = self.values.iter().map(|v| v.value.as_str()).collect();
        format!("({})", values.join(", "))
    }

    /// Filesystem-safe identifier, e.g. `os-ubuntu-latest_python-3.9`
    pub fn key(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{}-{}", sanitize(&v.axis), sanitize(&v.value)))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Axis bindings as reporting tags
    pub fn tags(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|v| (v.axis.clone(), v.value.clone()))
            .collect()
    }

    /// `MATRIX_<AXIS>=value` bindings exported to every command
    pub fn env_vars(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|v| (format!("MATRIX_{}", env_name(&v.axis)), v.value.clone()))
            .collect()
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.label())
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn env_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
