//! Test: Provisioning - transient failures are retried, exhaustion fails the job

use crate::helpers::*;
use matrix_ci::core::{JobStatus, RunStatus, StepStatus, PROVISION_STEP};
use matrix_ci::secrets::StaticSecretProvider;
use std::sync::Arc;

const STEPS: &str = "  - { name: test, run: run-tests }";

#[tokio::test]
async fn test_provision_fails_once_then_succeeds() {
    let workflow = two_by_two(4, true, STEPS);
    let provisioner = MockProvisioner::new().fail_provision("B, 2", 1);
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_job_status(&result, "(B, 2)", JobStatus::Succeeded);

    let outcome = result.outcome(3).unwrap();
    assert_eq!(outcome.provision_attempts, 2);
    assert_eq!(outcome.step(PROVISION_STEP).unwrap().attempts, 2);
    assert_eq!(recorder.provision_calls("(B, 2)"), 2);
    assert_eq!(recorder.provision_calls("(A, 1)"), 1);
}

#[tokio::test]
async fn test_provision_exhausted_fails_only_that_job() {
    let workflow = two_by_two(4, false, STEPS);
    let provisioner = MockProvisioner::new().fail_provision("A, 2", 10);
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_job_status(&result, "(A, 2)", JobStatus::Failed);
    assert_eq!(result.count(JobStatus::Succeeded), 3);

    let outcome = result.outcome(1).unwrap();
    assert_eq!(outcome.provision_attempts, 3);
    assert_eq!(recorder.provision_calls("(A, 2)"), 3);
    assert_eq!(outcome.step(PROVISION_STEP).unwrap().status, StepStatus::Failed);
    assert_eq!(outcome.step("test").unwrap().status, StepStatus::Skipped);
    assert!(outcome.error.as_ref().unwrap().contains("after 3 attempts"));
}

#[tokio::test]
async fn test_only_provisioning_is_retried() {
    let workflow = two_by_two(4, false, STEPS);
    let provisioner = MockProvisioner::new().fail_command("A, 1", "run-tests");
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_job_status(&result, "(A, 1)", JobStatus::Failed);
    let runs = recorder
        .commands()
        .into_iter()
        .filter(|c| c.job == "(A, 1)" && c.command == "run-tests")
        .count();
    assert_eq!(runs, 1);
    assert_eq!(result.outcome(0).unwrap().step("test").unwrap().attempts, 1);
}

#[tokio::test]
async fn test_setup_command_runs_in_each_environment() {
    let workflow = workflow_from_yaml(
        r#"
name: "setup"
matrix:
  axes:
    - name: python
      values: ["3.8", "3.9"]
provision:
  setup: "make-venv {{ matrix.python }}"
  retry_delay_ms: 1
steps:
  - { name: test, run: run-tests }
"#,
    );
    let provisioner = MockProvisioner::new().fail_command("3.9", "make-venv");
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_job_status(&result, "(3.8)", JobStatus::Succeeded);
    assert_job_status(&result, "(3.9)", JobStatus::Failed);

    // A failing setup counts as a provisioning failure and is retried
    assert_eq!(recorder.provision_calls("(3.9)"), 3);
    let setups: Vec<String> = recorder
        .commands()
        .into_iter()
        .filter(|c| c.command.starts_with("make-venv"))
        .map(|c| c.command)
        .collect();
    assert_eq!(setups.iter().filter(|c| *c == "make-venv 3.9").count(), 3);
    assert!(setups.contains(&"make-venv 3.8".to_string()));
}
