//! Test: Reporting - artifacts are forwarded with their job's axis values

use crate::helpers::*;
use async_trait::async_trait;
use matrix_ci::core::{ReportingError, RunStatus, TaggedArtifact};
use matrix_ci::reporting::{forward_artifacts, DirectoryUploader, ReportUploader};
use matrix_ci::secrets::StaticSecretProvider;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const STEPS: &str = "  - { name: test, run: run-tests, artifact: reports/coverage.xml }";

/// Uploader recording tags, failing for one axis value
struct RecordingUploader {
    fail_for: Option<String>,
    uploads: Mutex<Vec<BTreeMap<String, String>>>,
}

#[async_trait]
impl ReportUploader for RecordingUploader {
    async fn upload(&self, artifact: &TaggedArtifact) -> Result<(), ReportingError> {
        let tags = &artifact.tags;
        if let Some(value) = &self.fail_for {
            if tags.values().any(|v| v == value) {
                return Err(ReportingError::Transient("503 from coverage service".to_string()));
            }
        }
        self.uploads.lock().unwrap().push(tags.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_artifacts_are_tagged_and_written() {
    let workflow = two_by_two(4, true, STEPS);
    let mut result =
        run_workflow(&workflow, MockProvisioner::new(), Arc::new(StaticSecretProvider::new())).await;

    let root = tempfile::tempdir().unwrap();
    forward_artifacts(&mut result, &DirectoryUploader::new(root.path()), true).await;

    assert!(result.is_success());
    assert!(result.reporting_errors.is_empty());

    let written = std::fs::read_to_string(root.path().join("2-os-B_version-1").join("coverage.xml")).unwrap();
    assert!(written.contains("(B, 1)"));
}

#[tokio::test]
async fn test_upload_failure_is_logged_not_fatal() {
    let workflow = two_by_two(4, true, STEPS);
    let mut result =
        run_workflow(&workflow, MockProvisioner::new(), Arc::new(StaticSecretProvider::new())).await;
    let uploader = RecordingUploader {
        fail_for: Some("B".to_string()),
        uploads: Mutex::new(Vec::new()),
    };

    forward_artifacts(&mut result, &uploader, false).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.reporting_errors.len(), 2);
    let uploads = uploader.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|tags| tags.get("os").map(String::as_str) == Some("A")));
}

#[tokio::test]
async fn test_upload_failure_with_fail_on_error() {
    let workflow = two_by_two(4, true, STEPS);
    let mut result =
        run_workflow(&workflow, MockProvisioner::new(), Arc::new(StaticSecretProvider::new())).await;
    let uploader = RecordingUploader {
        fail_for: Some("2".to_string()),
        uploads: Mutex::new(Vec::new()),
    };

    forward_artifacts(&mut result, &uploader, true).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.reporting_errors.len(), 2);
}
