//! Job expander - Cartesian product of matrix axes

use crate::core::{AxisSet, ConfigError, JobSpec, PartialSpec};
use tracing::debug;

/// Expand `axes` into job specifications, minus `exclusions`
///
/// The first axis varies slowest; values keep declaration order. Indices are
/// assigned after exclusions, so they are always `0..len`.
pub fn expand(axes: &AxisSet, exclusions: &[PartialSpec]) -> Result<Vec<JobSpec>, ConfigError> {
    axes.validate()?;
    for (i, exclusion) in exclusions.iter().enumerate() {
        if exclusion.is_empty() {
            return Err(ConfigError::EmptyExclusion(i));
        }
        exclusion.validate_against(axes)?;
    }

    let total = axes.product_size()?;
    let mut jobs = Vec::with_capacity(total);
    let mut excluded = 0;

    // Odometer over value indices: the last axis ticks fastest
    let mut cursor = vec![0usize; axes.len()];
    for _ in 0..total {
        let values: Vec<(&str, &str)> = axes
            .axes()
            .iter()
            .zip(&cursor)
            .map(|(axis, &i)| (axis.name.as_str(), axis.values[i].as_str()))
            .collect();

        if exclusions.iter().any(|e| e.matches_values(&values)) {
            excluded += 1;
        } else {
            let owned = values
                .iter()
                .map(|(a, v)| (a.to_string(), v.to_string()))
                .collect();
            jobs.push(JobSpec::new(jobs.len(), owned));
        }

        for (pos, axis) in axes.axes().iter().enumerate().rev() {
            cursor[pos] += 1;
            if cursor[pos] < axis.values.len() {
                break;
            }
            cursor[pos] = 0;
        }
    }

    debug!(
        "Expanded {} axes into {} jobs ({} excluded)",
        axes.len(),
        jobs.len(),
        excluded
    );

    Ok(jobs)
}
