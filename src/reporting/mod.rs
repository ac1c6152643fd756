//! External reporting - forwards job artifacts (e.g. coverage reports)

pub mod directory;

use crate::core::{ReportingError, RunResult, RunStatus, TaggedArtifact};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub use directory::DirectoryUploader;

/// Trait for reporting backends
#[async_trait]
pub trait ReportUploader: Send + Sync {
    /// Upload one artifact, tagged with the axis values of its job
    async fn upload(&self, artifact: &TaggedArtifact) -> Result<(), ReportingError>;
}

/// Uploader that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullUploader;

#[async_trait]
impl ReportUploader for NullUploader {
    async fn upload(&self, tagged: &TaggedArtifact) -> Result<(), ReportingError> {
        debug!("Discarding artifact {}", tagged.artifact.path);
        Ok(())
    }
}

/// Upload every artifact of a run
///
/// Failures are logged and recorded in `reporting_errors`; they only flip the
/// run to failed when `fail_on_error` is set.
pub async fn forward_artifacts(
    result: &mut RunResult,
    uploader: &dyn ReportUploader,
    fail_on_error: bool,
) {
    for tagged in &result.artifacts {
        match uploader.upload(tagged).await {
            Ok(()) => info!(
                "Uploaded {} from job #{}",
                tagged.artifact.path, tagged.job_index
            ),
            Err(e) => {
                warn!(
                    "Failed to upload {} from job #{}: {}",
                    tagged.artifact.path, tagged.job_index, e
                );
                result
                    .reporting_errors
                    .push(format!("{} ({}): {}", tagged.artifact.path, tagged.job_key, e));
            }
        }
    }

    if fail_on_error && !result.reporting_errors.is_empty() {
        result.status = RunStatus::Failed;
    }
}
