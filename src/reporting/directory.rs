//! Directory uploader - writes artifacts under `<dir>/<index>-<job-key>/`

use crate::core::{ReportingError, TaggedArtifact};
use crate::reporting::ReportUploader;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Stores each artifact next to a `tags.json` describing its job
#[derive(Debug)]
pub struct DirectoryUploader {
    root: PathBuf,
    /// Files written by this uploader, with the step that produced them
    written: Mutex<HashMap<PathBuf, String>>,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Mutex::new(HashMap::new()),
        }
    }

    /// The expansion index keeps keys that sanitize alike apart
    fn job_dir(&self, tagged: &TaggedArtifact) -> PathBuf {
        let key = if tagged.job_key.is_empty() {
            "job"
        } else {
            tagged.job_key.as_str()
        };
        self.root.join(format!("{}-{}", tagged.job_index, key))
    }
}

#[async_trait]
impl ReportUploader for DirectoryUploader {
    async fn upload(&self, tagged: &TaggedArtifact) -> Result<(), ReportingError> {
        let artifact = &tagged.artifact;
        let dir = self.job_dir(tagged);
        let target = dir.join(artifact.file_name());

        {
            let mut written = self.written.lock().await;
            if let Some(step) = written.get(&target) {
                return Err(ReportingError::Fatal(format!(
                    "{} would overwrite the artifact of step '{}'",
                    target.display(),
                    step
                )));
            }
            written.insert(target.clone(), artifact.step.clone());
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReportingError::Fatal(format!("{}: {}", dir.display(), e)))?;

        tokio::fs::write(&target, &artifact.content)
            .await
            .map_err(|e| ReportingError::Transient(format!("{}: {}", target.display(), e)))?;

        let tags_json = serde_json::to_string_pretty(&tagged.tags)
            .map_err(|e| ReportingError::Fatal(e.to_string()))?;
        tokio::fs::write(dir.join("tags.json"), tags_json)
            .await
            .map_err(|e| ReportingError::Transient(e.to_string()))?;

        Ok(())
    }
}
