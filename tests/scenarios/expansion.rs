//! Test: Matrix Expansion - job order, exclusions and per-job variables

use crate::helpers::*;
use matrix_ci::core::{AxisSet, ConfigError};
use matrix_ci::core::config::WorkflowConfig;
use matrix_ci::secrets::StaticSecretProvider;
use matrix_ci::{Axis, PartialSpec};
use std::sync::Arc;

fn labels(workflow: &matrix_ci::Workflow) -> Vec<String> {
    workflow.jobs().unwrap().iter().map(|j| j.label()).collect()
}

#[test]
fn test_two_axes_expand_in_declaration_order() {
    let workflow = two_by_two(4, true, "  - { name: test, run: make test }");

    assert_eq!(labels(&workflow), vec!["(A, 1)", "(A, 2)", "(B, 1)", "(B, 2)"]);

    let indices: Vec<usize> = workflow.jobs().unwrap().iter().map(|j| j.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[test]
fn test_expansion_is_deterministic() {
    let workflow = two_by_two(4, true, "  - { name: test, run: make test }");
    assert_eq!(workflow.jobs().unwrap(), workflow.jobs().unwrap());
}

#[test]
fn test_exclusions_from_yaml() {
    let workflow = workflow_from_yaml(
        r#"
name: "exclusions"
matrix:
  axes:
    - name: os
      values: [ubuntu-latest, macos-latest, windows-latest]
    - name: python
      values: ["3.8", "3.9", "3.10"]
  exclude:
    - { os: windows-latest }
    - { os: macos-latest, python: "3.8" }
steps:
  - { name: test, run: pytest }
"#,
    );

    assert_eq!(
        labels(&workflow),
        vec![
            "(ubuntu-latest, 3.8)",
            "(ubuntu-latest, 3.9)",
            "(ubuntu-latest, 3.10)",
            "(macos-latest, 3.9)",
            "(macos-latest, 3.10)",
        ]
    );
}

#[test]
fn test_product_size_without_exclusions() {
    let axes = AxisSet::new(vec![
        Axis::new("a", vec!["1", "2", "3"]),
        Axis::new("b", vec!["x", "y"]),
        Axis::new("c", vec!["p", "q"]),
    ]);

    let jobs = matrix_ci::expand(&axes, &[]).unwrap();

    assert_eq!(jobs.len(), 12);
    let mut unique = jobs.iter().map(|j| j.label()).collect::<Vec<_>>();
    unique.dedup();
    assert_eq!(unique.len(), 12);
}

#[test]
fn test_unknown_axis_in_exclusion_is_a_config_error() {
    let axes = AxisSet::new(vec![Axis::new("os", vec!["A", "B"])]);
    let exclusion = PartialSpec::new(vec![("arch", "arm64")]);

    assert!(matches!(
        matrix_ci::expand(&axes, &[exclusion]),
        Err(ConfigError::UnknownAxis(name)) if name == "arch"
    ));
}

#[test]
fn test_empty_axis_is_rejected_before_running() {
    let result = WorkflowConfig::from_yaml(
        r#"
name: "empty"
matrix:
  axes:
    - name: os
      values: []
steps:
  - { name: test, run: make }
"#,
    );

    assert!(matches!(result, Err(ConfigError::EmptyAxis(axis)) if axis == "os"));
}

#[tokio::test]
async fn test_each_job_sees_its_own_axis_values() {
    let workflow = two_by_two(4, false, "  - { name: build, run: \"build --os {{ matrix.os }} --v {{ matrix.version }}\" }");
    let provisioner = MockProvisioner::new();
    let recorder = provisioner.recorder();

    let result = run_workflow(&workflow, provisioner, Arc::new(StaticSecretProvider::new())).await;
    assert!(result.is_success());

    let mut seen: Vec<(String, String, String)> = recorder
        .commands()
        .into_iter()
        .map(|c| {
            (
                c.command,
                c.env.get("MATRIX_OS").cloned().unwrap_or_default(),
                c.env.get("CI_EVENT").cloned().unwrap_or_default(),
            )
        })
        .collect();
    seen.sort();

    assert_eq!(
        seen,
        vec![
            ("build --os A --v 1".to_string(), "A".to_string(), "push".to_string()),
            ("build --os A --v 2".to_string(), "A".to_string(), "push".to_string()),
            ("build --os B --v 1".to_string(), "B".to_string(), "push".to_string()),
            ("build --os B --v 2".to_string(), "B".to_string(), "push".to_string()),
        ]
    );
}
