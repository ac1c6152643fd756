//! Pipeline runner - provisions an environment and runs a job's steps in it

use crate::{
    core::{
        Artifact, EnvBinding, JobContext, JobOutcome, JobSpec, JobStatus, PipelineStep,
        ProvisionError, ProvisionPolicy, StepResult, StepStatus, referenced_secrets, PROVISION_STEP,
    },
    execution::engine::{EventBus, ExecutionEvent},
    provision::{CommandOutput, Environment, EnvironmentProvisioner},
    secrets::{Redactor, SecretProvider},
};
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Runs the pipeline of one job at a time
pub struct PipelineRunner<P> {
    provisioner: P,
    policy: ProvisionPolicy,
    context: JobContext,
    pub(crate) events: EventBus,
}

impl<P: EnvironmentProvisioner> PipelineRunner<P> {
    pub fn new(provisioner: P, policy: ProvisionPolicy) -> Self {
        Self {
            provisioner,
            policy,
            context: JobContext::new(),
            events: EventBus::default(),
        }
    }

    /// Base context (variables, trigger) every job is rendered with
    pub fn with_context(mut self, context: JobContext) -> Self {
        self.context = context;
        self
    }

    /// Execute the pipeline for `job` and return its terminal outcome
    ///
    /// Provisioning is retried up to the policy's attempt count. Every other
    /// step runs once; a failure skips the remaining steps unless the step
    /// is marked continue-on-error.
    pub async fn execute(
        &self,
        job: &JobSpec,
        steps: &[PipelineStep],
        secrets: &dyn SecretProvider,
    ) -> JobOutcome {
        let started_at = Utc::now();
        info!("Executing job {}", job);

        let context = self.context.for_job(job);
        let redactor = redactor_for(steps, secrets);
        let mut results = Vec::with_capacity(steps.len() + 1);

        let (environment, provision_result) = self.provision(job, &context, &redactor).await;
        let provision_attempts = provision_result.attempts;
        self.step_finished(job, &provision_result).await;
        results.push(provision_result);

        let environment = match environment {
            Ok(environment) => environment,
            Err(e) => {
                error!("Job {} could not be provisioned: {}", job, e);
                results.extend(steps.iter().map(|s| StepResult::skipped(&s.name)));
                return JobOutcome {
                    job: job.clone(),
                    status: JobStatus::Failed,
                    steps: results,
                    artifacts: Vec::new(),
                    provision_attempts,
                    error: Some(e.to_string()),
                    started_at: Some(started_at),
                    finished_at: Utc::now(),
                };
            }
        };

        let mut status = JobStatus::Succeeded;
        let mut failure = None;
        let mut artifacts = Vec::new();

        for step in steps {
            if failure.is_some() {
                results.push(StepResult::skipped(&step.name));
                continue;
            }

            let result = self
                .run_step(environment.as_ref(), job, step, &context, secrets, &redactor)
                .await;
            self.step_finished(job, &result).await;

            if result.passed() {
                if let Some(path) = &step.artifact {
                    match environment.read_file(path).await {
                        Ok(content) => artifacts.push(Artifact {
                            path: path.clone(),
                            step: step.name.clone(),
                            content: redactor.redact(&content),
                        }),
                        Err(e) => warn!("Job {} step {} declared artifact: {}", job, step.name, e),
                    }
                }
            } else if step.continue_on_error {
                warn!("Job {} step {} failed, continuing on error", job, step.name);
            } else {
                status = JobStatus::Failed;
                failure = Some(format!(
                    "Step '{}' failed: {}",
                    step.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }

            results.push(result);
        }

        environment.teardown().await;

        match status {
            JobStatus::Succeeded => info!("Job {} succeeded", job),
            _ => warn!("Job {} failed", job),
        }

        JobOutcome {
            job: job.clone(),
            status,
            steps: results,
            artifacts,
            provision_attempts,
            error: failure,
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    /// Acquire an environment, retrying transient failures
    async fn provision(
        &self,
        job: &JobSpec,
        context: &JobContext,
        redactor: &Redactor,
    ) -> (Result<Box<dyn Environment>, ProvisionError>, StepResult) {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_before(attempt);
                self.events
                    .emit(ExecutionEvent::ProvisionRetrying {
                        job: job.clone(),
                        attempt,
                        max_attempts,
                        error: last_error.clone(),
                    })
                    .await;
                tokio::time::sleep(delay).await;
            }

            match self.try_provision(job, context).await {
                Ok((environment, output)) => {
                    if attempt > 1 {
                        info!("Job {} provisioned after {} attempts", job, attempt);
                    }
                    let result = StepResult {
                        name: PROVISION_STEP.to_string(),
                        status: StepStatus::Passed,
                        exit_code: output.as_ref().and_then(|o| o.exit_code),
                        stdout: output.as_ref().map(|o| redactor.redact(&o.stdout)).unwrap_or_default(),
                        stderr: output.as_ref().map(|o| redactor.redact(&o.stderr)).unwrap_or_default(),
                        attempts: attempt,
                        duration_ms: started.elapsed().as_millis() as u64,
                        continue_on_error: false,
                        error: None,
                    };
                    return (Ok(environment), result);
                }
                Err(e) => {
                    last_error = redactor.redact(&e.to_string());
                    warn!(
                        "Provisioning attempt {}/{} for job {} failed: {}",
                        attempt, max_attempts, job, last_error
                    );
                }
            }
        }

        let error = ProvisionError::Exhausted {
            attempts: max_attempts,
            last_error,
        };
        let result = StepResult {
            name: PROVISION_STEP.to_string(),
            status: StepStatus::Failed,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            attempts: max_attempts,
            duration_ms: started.elapsed().as_millis() as u64,
            continue_on_error: false,
            error: Some(error.to_string()),
        };
        (Err(error), result)
    }

    /// One provisioning attempt: acquire, then run the setup command
    async fn try_provision(
        &self,
        job: &JobSpec,
        context: &JobContext,
    ) -> Result<(Box<dyn Environment>, Option<CommandOutput>), ProvisionError> {
        let environment = self.provisioner.provision(job).await?;

        let Some(setup) = &self.policy.setup else {
            return Ok((environment, None));
        };

        let command = context.render(setup);
        debug!("Setup for job {}: {}", job, command);

        let vars = base_env(job, context);
        let output = match timeout(
            Duration::from_secs(self.policy.timeout_secs),
            environment.run_command(&command, &vars),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                environment.teardown().await;
                return Err(ProvisionError::Unavailable(e.to_string()));
            }
            Err(_) => {
                environment.teardown().await;
                return Err(ProvisionError::Unavailable(format!(
                    "Setup timed out after {} seconds",
                    self.policy.timeout_secs
                )));
            }
        };

        if !output.success() {
            environment.teardown().await;
            return Err(ProvisionError::SetupFailed {
                exit_code: output.exit_code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok((environment, Some(output)))
    }

    /// Run a single step once
    async fn run_step(
        &self,
        environment: &dyn Environment,
        job: &JobSpec,
        step: &PipelineStep,
        context: &JobContext,
        secrets: &dyn SecretProvider,
        redactor: &Redactor,
    ) -> StepResult {
        let started = Instant::now();
        let mut result = StepResult {
            name: step.name.clone(),
            status: StepStatus::Failed,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            attempts: 1,
            duration_ms: 0,
            continue_on_error: step.continue_on_error,
            error: None,
        };

        let mut vars = base_env(job, context);
        for (key, binding) in &step.env {
            match binding {
                EnvBinding::Literal(value) => {
                    vars.insert(key.clone(), context.render(value));
                }
                EnvBinding::Secret(name) => match secrets.get(name) {
                    Ok(secret) => {
                        vars.insert(key.clone(), secret.expose().to_string());
                    }
                    Err(e) => {
                        error!("Job {} step {}: {}", job, step.name, e);
                        result.error = Some(e.to_string());
                        result.duration_ms = started.elapsed().as_millis() as u64;
                        return result;
                    }
                },
            }
        }

        let command = step.render_command(context);
        info!("Running step {} for job {}", step.name, job);
        debug!("Command: {}", redactor.redact(&command));

        match timeout(
            Duration::from_secs(step.timeout_secs),
            environment.run_command(&command, &vars),
        )
        .await
        {
            Ok(Ok(output)) => {
                result.exit_code = output.exit_code;
                result.stdout = redactor.redact(&output.stdout);
                result.stderr = redactor.redact(&output.stderr);
                if output.success() {
                    result.status = StepStatus::Passed;
                } else {
                    result.error = Some(match output.exit_code {
                        Some(code) => format!("exited with code {}", code),
                        None => "terminated by signal".to_string(),
                    });
                }
            }
            Ok(Err(e)) => {
                error!("Job {} step {}: {}", job, step.name, e);
                result.error = Some(e.to_string());
            }
            Err(_) => {
                error!("Timeout for step {} after {}s", step.name, step.timeout_secs);
                result.error = Some(format!("Timeout after {} seconds", step.timeout_secs));
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn step_finished(&self, job: &JobSpec, result: &StepResult) {
        self.events
            .emit(ExecutionEvent::StepFinished {
                job: job.clone(),
                step: result.name.clone(),
                status: result.status,
                attempts: result.attempts,
            })
            .await;
    }
}

/// Redactor knowing every secret any step of the job binds
///
/// Built before provisioning so output of setup and of steps that run
/// before the binding step is masked too. Unresolvable names are left for
/// the binding step to report.
fn redactor_for(steps: &[PipelineStep], secrets: &dyn SecretProvider) -> Redactor {
    let mut redactor = Redactor::new();
    for name in referenced_secrets(steps) {
        if let Ok(secret) = secrets.get(name) {
            redactor.add(&secret);
        }
    }
    redactor
}

/// Variables every command of a job receives
fn base_env(job: &JobSpec, context: &JobContext) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = job.env_vars().into_iter().collect();
    vars.insert("CI_JOB_INDEX".to_string(), job.index.to_string());
    if let Some(trigger) = &context.trigger {
        vars.insert("CI_EVENT".to_string(), trigger.event.clone());
        vars.insert("CI_REVISION".to_string(), trigger.revision.clone());
    }
    vars
}
