//! Test: Concurrency - never more than max_parallel jobs in flight

use crate::helpers::*;
use matrix_ci::core::JobStatus;
use matrix_ci::secrets::StaticSecretProvider;
use std::sync::Arc;
use std::time::Duration;

fn six_jobs(max_parallel: usize) -> matrix_ci::Workflow {
    workflow_from_yaml(&format!(
        r#"
name: "six"
matrix:
  axes:
    - name: shard
      values: [s1, s2, s3, s4, s5, s6]
strategy:
  max_parallel: {}
steps:
  - {{ name: build, run: build }}
  - {{ name: test, run: test }}
"#,
        max_parallel
    ))
}

#[tokio::test]
async fn test_max_parallel_bounds_running_jobs() {
    let workflow = six_jobs(2);
    let provisioner = MockProvisioner::new().delay("s", Duration::from_millis(20));
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert!(result.is_success());
    assert_eq!(result.count(JobStatus::Succeeded), 6);
    assert_eq!(recorder.max_in_flight(), 2);
}

#[tokio::test]
async fn test_sequential_runs_one_job_at_a_time() {
    let workflow = six_jobs(1);
    let provisioner = MockProvisioner::new().delay("s", Duration::from_millis(5));
    let recorder = provisioner.recorder();

    run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert_eq!(recorder.max_in_flight(), 1);

    // Jobs ran in expansion order
    let order: Vec<String> = recorder
        .commands()
        .into_iter()
        .filter(|c| c.command == "build")
        .map(|c| c.job)
        .collect();
    assert_eq!(order, vec!["(s1)", "(s2)", "(s3)", "(s4)", "(s5)", "(s6)"]);
}

#[tokio::test]
async fn test_limit_above_job_count() {
    let workflow = six_jobs(50);
    let provisioner = MockProvisioner::new().delay("s", Duration::from_millis(20));
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;

    assert!(result.is_success());
    assert!(recorder.max_in_flight() <= 6);
}

#[test]
fn test_zero_max_parallel_is_a_config_error() {
    let result = matrix_ci::core::config::WorkflowConfig::from_yaml(
        r#"
name: "zero"
matrix:
  axes:
    - { name: shard, values: [a] }
strategy: { max_parallel: 0 }
steps:
  - { name: build, run: build }
"#,
    );

    assert!(matches!(
        result,
        Err(matrix_ci::core::ConfigError::InvalidMaxParallel)
    ));
}
