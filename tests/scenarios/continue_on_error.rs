//! Test: Continue on error - tolerated failures never fail the run

use crate::helpers::*;
use matrix_ci::core::{JobStatus, RunStatus, StepStatus};
use matrix_ci::secrets::StaticSecretProvider;
use std::sync::Arc;

fn workflow(fail_fast: bool) -> matrix_ci::Workflow {
    workflow_from_yaml(&format!(
        r#"
name: "experimental"
matrix:
  axes:
    - name: python
      values: ["3.8", "3.9", "3.13-dev"]
  continue_on_error:
    - {{ python: "3.13-dev" }}
strategy:
  max_parallel: 1
  fail_fast: {}
steps:
  - {{ name: lint, run: lint, continue_on_error: true }}
  - {{ name: test, run: run-tests }}
"#,
        fail_fast
    ))
}

#[tokio::test]
async fn test_tolerated_job_failure_keeps_run_green() {
    let provisioner = MockProvisioner::new().fail_command("3.13-dev", "run-tests");

    let result = run_workflow(&workflow(true), provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_job_status(&result, "(3.13-dev)", JobStatus::Failed);
    assert!(result.outcome(2).unwrap().job.continue_on_error);
}

#[tokio::test]
async fn test_tolerated_job_failure_does_not_trigger_fail_fast() {
    let workflow = workflow_from_yaml(
        r#"
name: "experimental-first"
matrix:
  axes:
    - name: python
      values: ["3.13-dev", "3.8", "3.9"]
  continue_on_error:
    - { python: "3.13-dev" }
strategy: { max_parallel: 1, fail_fast: true }
steps:
  - { name: test, run: run-tests }
"#,
    );
    let provisioner = MockProvisioner::new().fail_command("3.13-dev", "run-tests");

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert!(result.is_success());
    assert_eq!(result.count(JobStatus::Cancelled), 0);
    assert_eq!(result.count(JobStatus::Succeeded), 2);
}

#[tokio::test]
async fn test_continue_on_error_step() {
    let provisioner = MockProvisioner::new().fail_command("3.8", "lint");

    let result = run_workflow(&workflow(true), provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert!(result.is_success());
    let outcome = result.outcome(0).unwrap();
    assert_eq!(outcome.status, JobStatus::Succeeded);
    assert_eq!(outcome.step("lint").unwrap().status, StepStatus::Failed);
    assert_eq!(outcome.step("test").unwrap().status, StepStatus::Passed);
}

#[tokio::test]
async fn test_untolerated_failure_still_fails_the_run() {
    let provisioner = MockProvisioner::new().fail_command("3.9", "run-tests");

    let result = run_workflow(&workflow(true), provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_job_status(&result, "(3.9)", JobStatus::Failed);
    assert_job_status(&result, "(3.13-dev)", JobStatus::Cancelled);
}
