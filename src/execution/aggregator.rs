//! Run aggregation - folds job outcomes into one run result

use crate::core::{JobOutcome, RunResult, RunStatus, TaggedArtifact};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

/// Combine the outcomes of every job of a run
///
/// The run fails iff some job failed without continue-on-error. Cancelled
/// jobs never fail a run on their own: they only exist because another job
/// already did.
pub fn aggregate(mut outcomes: Vec<JobOutcome>) -> RunResult {
    outcomes.sort_by_key(|o| o.job.index);

    let status = if outcomes.iter().any(JobOutcome::counts_as_failure) {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    };

    let artifacts = outcomes
        .iter()
        .flat_map(|outcome| {
            let tags = outcome.job.tags();
            let job_key = outcome.job.key();
            outcome.artifacts.iter().map(move |artifact| TaggedArtifact {
                job_index: outcome.job.index,
                job_key: job_key.clone(),
                tags: tags.clone(),
                artifact: artifact.clone(),
            })
        })
        .collect::<Vec<_>>();

    let completed_at = Utc::now();
    let started_at = outcomes
        .iter()
        .filter_map(|o| o.started_at)
        .min()
        .unwrap_or(completed_at);

    debug!(
        "Aggregated {} outcomes ({} artifacts): {}",
        outcomes.len(),
        artifacts.len(),
        status
    );

    RunResult {
        run_id: Uuid::new_v4(),
        status,
        outcomes,
        artifacts,
        reporting_errors: Vec::new(),
        started_at,
        completed_at,
    }
}
