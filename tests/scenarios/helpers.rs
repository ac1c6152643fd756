//! Test utilities for matrix runs

use async_trait::async_trait;
use matrix_ci::core::config::WorkflowConfig;
use matrix_ci::core::{
    EnvironmentError, JobStatus, ProvisionError, RunResult, Trigger, Workflow,
};
use matrix_ci::execution::{ExecutionEngine, PipelineRunner};
use matrix_ci::provision::{CommandOutput, Environment, EnvironmentProvisioner};
use matrix_ci::secrets::SecretProvider;
use matrix_ci::JobSpec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A command the mock environment ran
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub job: String,
    pub command: String,
    pub env: HashMap<String, String>,
}

#[derive(Default)]
struct Shared {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    provision_calls: Mutex<HashMap<String, usize>>,
    commands: Mutex<Vec<RecordedCommand>>,
}

/// Provisioner whose environments answer commands from simple rules
///
/// Rules match on a substring of the job label, e.g. `"A, 1"` for the job
/// `(A, 1)`.
#[derive(Default)]
pub struct MockProvisioner {
    failing_commands: Vec<(String, String)>,
    provision_failures: HashMap<String, usize>,
    delays: Vec<(String, Duration)>,
    shared: Arc<Shared>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `command` exit 1 in jobs whose label contains `job`
    pub fn fail_command(mut self, job: &str, command: &str) -> Self {
        self.failing_commands.push((job.to_string(), command.to_string()));
        self
    }

    /// The first `times` provisioning attempts of matching jobs fail
    pub fn fail_provision(mut self, job: &str, times: usize) -> Self {
        self.provision_failures.insert(job.to_string(), times);
        self
    }

    /// Every command of matching jobs takes `delay`
    pub fn delay(mut self, job: &str, delay: Duration) -> Self {
        self.delays.push((job.to_string(), delay));
        self
    }

    pub fn recorder(&self) -> Recorder {
        Recorder {
            shared: self.shared.clone(),
        }
    }
}

#[async_trait]
impl EnvironmentProvisioner for MockProvisioner {
    async fn provision(&self, job: &JobSpec) -> Result<Box<dyn Environment>, ProvisionError> {
        let label = job.label();
        let calls = {
            let mut calls = self.shared.provision_calls.lock().unwrap();
            let entry = calls.entry(label.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let allowed_failures = self
            .provision_failures
            .iter()
            .find(|(pattern, _)| label.contains(pattern.as_str()))
            .map(|(_, times)| *times)
            .unwrap_or(0);
        if calls <= allowed_failures {
            return Err(ProvisionError::Unavailable(format!(
                "no capacity for {} (call {})",
                label, calls
            )));
        }

        let in_flight = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        Ok(Box::new(MockEnvironment {
            failing: self
                .failing_commands
                .iter()
                .filter(|(pattern, _)| label.contains(pattern.as_str()))
                .map(|(_, command)| command.clone())
                .collect(),
            delay: self
                .delays
                .iter()
                .find(|(pattern, _)| label.contains(pattern.as_str()))
                .map(|(_, delay)| *delay),
            label,
            last_token: Mutex::new(None),
            shared: self.shared.clone(),
        }))
    }
}

struct MockEnvironment {
    label: String,
    failing: Vec<String>,
    delay: Option<Duration>,
    last_token: Mutex<Option<String>>,
    shared: Arc<Shared>,
}

#[async_trait]
impl Environment for MockEnvironment {
    async fn run_command(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, EnvironmentError> {
        self.shared.commands.lock().unwrap().push(RecordedCommand {
            job: self.label.clone(),
            command: command.to_string(),
            env: env.clone(),
        });

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if self.failing.iter().any(|f| command.contains(f.as_str())) {
            return Ok(CommandOutput::new(1, "", format!("{} failed", command)));
        }

        // Echoes its TOKEN variable everywhere it can
        if command.contains("print-token") {
            let token = env.get("TOKEN").cloned().unwrap_or_default();
            *self.last_token.lock().unwrap() = Some(token.clone());
            return Ok(CommandOutput::new(
                0,
                format!("using token {}", token),
                format!("debug: TOKEN={}", token),
            ));
        }

        Ok(CommandOutput::new(0, format!("{} ok", command), ""))
    }

    async fn read_file(&self, path: &str) -> Result<String, EnvironmentError> {
        let token = self.last_token.lock().unwrap().clone().unwrap_or_default();
        Ok(format!("{} for {} token={}", path, self.label, token))
    }
}

impl Drop for MockEnvironment {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Read-only view of what the mock environments saw
#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Shared>,
}

impl Recorder {
    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn provision_calls(&self, label: &str) -> usize {
        self.shared
            .provision_calls
            .lock()
            .unwrap()
            .get(label)
            .copied()
            .unwrap_or(0)
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.shared.commands.lock().unwrap().clone()
    }

    /// Labels of jobs that ran at least one command
    pub fn jobs_started(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self.commands().into_iter().map(|c| c.job).collect();
        jobs.sort();
        jobs.dedup();
        jobs
    }
}

/// Parse a workflow from YAML string
pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .and_then(|config| config.to_workflow())
        .unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {}", e))
}

/// Run every job of `workflow` with its own strategy
pub async fn run_workflow(
    workflow: &Workflow,
    provisioner: MockProvisioner,
    secrets: Arc<dyn SecretProvider>,
) -> RunResult {
    let trigger = Trigger::new("push", "abc123");
    let runner = PipelineRunner::new(provisioner, workflow.provision.clone())
        .with_context(workflow.context(&trigger));
    let engine = ExecutionEngine::new(runner, workflow.steps.clone(), secrets);

    let jobs = workflow.jobs().expect("matrix expands");
    let strategy = matrix_ci::SchedulingStrategy::from_max_parallel(workflow.strategy.max_parallel);

    tokio::time::timeout(
        Duration::from_secs(30),
        engine.run(jobs, strategy, workflow.strategy.fail_fast),
    )
    .await
    .expect("run finishes")
}

/// Job labels with their terminal status, in expansion order
pub fn statuses(result: &RunResult) -> Vec<(String, JobStatus)> {
    result
        .outcomes
        .iter()
        .map(|o| (o.job.label(), o.status))
        .collect()
}

/// Assert the status of the job with `label`
pub fn assert_job_status(result: &RunResult, label: &str, expected: JobStatus) {
    let outcome = result
        .outcomes
        .iter()
        .find(|o| o.job.label() == label)
        .unwrap_or_else(|| panic!("Job {} not found in {:?}", label, statuses(result)));

    assert_eq!(
        outcome.status, expected,
        "Job {} should be {}, all jobs: {:?}",
        label, expected, statuses(result)
    );
}

/// Two-axis workflow used by most scenarios: os [A, B] x version [1, 2]
pub fn two_by_two(max_parallel: usize, fail_fast: bool, steps: &str) -> Workflow {
    let yaml = format!(
        r#"
name: "two-by-two"
matrix:
  axes:
    - name: os
      values: [A, B]
    - name: version
      values: ["1", "2"]
strategy:
  max_parallel: {}
  fail_fast: {}
provision:
  max_attempts: 3
  retry_delay_ms: 1
steps:
{}
"#,
        max_parallel, fail_fast, steps
    );
    workflow_from_yaml(&yaml)
}
