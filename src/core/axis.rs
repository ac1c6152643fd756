//! Matrix axes and partial job specifications

use crate::core::{error::ConfigError, job::JobSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One independent dimension of the build matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name (e.g. "os")
    pub name: String,

    /// Permissible values, in declaration order
    pub values: Vec<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether `value` is one of this axis' values
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// The ordered set of axes making up a matrix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSet {
    axes: Vec<Axis>,
}

impl AxisSet {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Size of the full Cartesian product
    pub fn product_size(&self) -> Result<usize, ConfigError> {
        if self.axes.is_empty() {
            return Ok(0);
        }
        self.axes.iter().try_fold(1usize, |size, axis| {
            size.checked_mul(axis.values.len())
                .ok_or(ConfigError::MatrixTooLarge)
        })
    }

    /// Check the set is well formed: at least one axis, every axis non-empty,
    /// axis names unique and no value listed twice within an axis
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axes.is_empty() {
            return Err(ConfigError::NoAxes);
        }

        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.name.as_str()) {
                return Err(ConfigError::DuplicateAxis(axis.name.clone()));
            }
            if axis.values.is_empty() {
                return Err(ConfigError::EmptyAxis(axis.name.clone()));
            }
            let mut values = HashSet::new();
            for value in &axis.values {
                if !values.insert(value.as_str()) {
                    return Err(ConfigError::DuplicateValue {
                        axis: axis.name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        self.product_size()?;
        Ok(())
    }
}

/// A subset of axes bound to values. Used both for exclusions and for
/// selecting which jobs may continue on error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSpec {
    entries: Vec<(String, String)>,
}

impl PartialSpec {
    pub fn new(entries: Vec<(impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every referenced axis and value must exist in `axes`
    pub fn validate_against(&self, axes: &AxisSet) -> Result<(), ConfigError> {
        for (name, value) in &self.entries {
            let axis = axes
                .axis(name)
                .ok_or_else(|| ConfigError::UnknownAxis(name.clone()))?;
            if !axis.contains(value) {
                return Err(ConfigError::UnknownValue {
                    axis: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// True when the job carries every value of this partial spec
    pub fn matches(&self, job: &JobSpec) -> bool {
        self.entries
            .iter()
            .all(|(axis, value)| job.get(axis) == Some(value.as_str()))
    }

    /// Same as [`matches`](Self::matches), on raw (axis, value) pairs
    pub(crate) fn matches_values(&self, values: &[(&str, &str)]) -> bool {
        self.entries.iter().all(|(axis, value)| {
            values
                .iter()
                .any(|(a, v)| *a == axis.as_str() && *v == value.as_str())
        })
    }
}
