//! Main execution engine - runs every job of a matrix under the concurrency
//! limit and the fail-fast policy

use crate::{
    core::{JobOutcome, JobSpec, JobStatus, PipelineStep, RunResult, RunStatus, StepStatus},
    execution::{aggregator, JobScheduler, PipelineRunner, SchedulingStrategy},
    provision::EnvironmentProvisioner,
    secrets::SecretProvider,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        total_jobs: usize,
        max_parallel: usize,
    },
    JobStarted {
        job: JobSpec,
    },
    ProvisionRetrying {
        job: JobSpec,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    StepFinished {
        job: JobSpec,
        step: String,
        status: StepStatus,
        attempts: u32,
    },
    JobFinished {
        job: JobSpec,
        status: JobStatus,
        duration_ms: u64,
    },
    JobCancelled {
        job: JobSpec,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Shared list of event handlers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub async fn subscribe(&self, handler: EventHandler) {
        self.handlers.lock().await.push(handler);
    }

    /// Emit an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Concurrency controller for one matrix run
pub struct ExecutionEngine<P> {
    runner: Arc<PipelineRunner<P>>,
    steps: Arc<Vec<PipelineStep>>,
    secrets: Arc<dyn SecretProvider>,
    events: EventBus,
}

impl<P: EnvironmentProvisioner + 'static> ExecutionEngine<P> {
    pub fn new(
        mut runner: PipelineRunner<P>,
        steps: Vec<PipelineStep>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        let events = EventBus::default();
        runner.events = events.clone();

        Self {
            runner: Arc::new(runner),
            steps: Arc::new(steps),
            secrets,
            events,
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(handler)).await;
    }

    /// Run every job and aggregate the outcomes
    ///
    /// Jobs are dispatched in expansion order with at most
    /// `strategy.limit(jobs.len())` in flight. With `fail_fast`, the first
    /// failing job stops dispatch: jobs already running finish normally and
    /// every job not yet started is reported as cancelled.
    pub async fn run(
        &self,
        jobs: Vec<JobSpec>,
        strategy: SchedulingStrategy,
        fail_fast: bool,
    ) -> RunResult {
        let started_at = Utc::now();
        let total = jobs.len();
        let mut scheduler = JobScheduler::new(strategy, jobs);

        info!(
            "Starting run: {} jobs, max {} in parallel, fail-fast {}",
            total,
            scheduler.limit(),
            fail_fast
        );
        self.events
            .emit(ExecutionEvent::RunStarted {
                total_jobs: total,
                max_parallel: scheduler.limit(),
            })
            .await;

        let mut running = JoinSet::new();
        let mut in_flight = HashMap::new();
        let mut outcomes = Vec::with_capacity(total);

        loop {
            for job in scheduler.next_jobs() {
                self.events
                    .emit(ExecutionEvent::JobStarted { job: job.clone() })
                    .await;
                let handle = running.spawn(self.supervise(job.clone()));
                in_flight.insert(handle.id(), job);
            }

            if !scheduler.has_more() {
                break;
            }

            let Some(joined) = running.join_next_with_id().await else {
                break;
            };
            scheduler.job_finished();

            let Some(outcome) = joined_outcome(joined, &mut in_flight) else {
                continue;
            };

            self.events
                .emit(ExecutionEvent::JobFinished {
                    job: outcome.job.clone(),
                    status: outcome.status,
                    duration_ms: outcome.duration_ms(),
                })
                .await;

            if fail_fast && outcome.counts_as_failure() && !scheduler.is_halted() {
                warn!(
                    "Job {} failed, not starting remaining jobs (fail-fast)",
                    outcome.job
                );
                scheduler.halt();
            }

            outcomes.push(outcome);
        }

        for job in scheduler.drain_pending() {
            info!("Cancelled job {}", job);
            self.events
                .emit(ExecutionEvent::JobCancelled { job: job.clone() })
                .await;
            outcomes.push(JobOutcome::cancelled(job));
        }

        let mut result = aggregator::aggregate(outcomes);
        result.started_at = started_at;

        info!(
            "Run {} {}: {} succeeded, {} failed, {} cancelled",
            result.run_id,
            result.status,
            result.count(JobStatus::Succeeded),
            result.count(JobStatus::Failed),
            result.count(JobStatus::Cancelled)
        );
        self.events
            .emit(ExecutionEvent::RunCompleted {
                run_id: result.run_id,
                status: result.status,
            })
            .await;

        result
    }

    /// Future running one job on its own task, turning a panic into a
    /// failed outcome
    fn supervise(&self, job: JobSpec) -> impl std::future::Future<Output = JobOutcome> + Send + 'static {
        let runner = self.runner.clone();
        let steps = self.steps.clone();
        let secrets = self.secrets.clone();

        async move {
            let task_job = job.clone();
            let handle = tokio::spawn(async move {
                runner.execute(&task_job, &steps, secrets.as_ref()).await
            });

            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Job {} crashed: {}", job, e);
                    JobOutcome::crashed(job, format!("Job task crashed: {}", e))
                }
            }
        }
    }
}

/// Outcome of a finished supervisor task
///
/// A supervisor that was itself aborted or panicked still yields a failed
/// outcome for its job.
fn joined_outcome(
    joined: Result<(Id, JobOutcome), JoinError>,
    in_flight: &mut HashMap<Id, JobSpec>,
) -> Option<JobOutcome> {
    match joined {
        Ok((id, outcome)) => {
            in_flight.remove(&id);
            Some(outcome)
        }
        Err(e) => match in_flight.remove(&e.id()) {
            Some(job) => {
                error!("Supervisor of job {} failed: {}", job, e);
                Some(JobOutcome::crashed(job, format!("Job supervisor failed: {}", e)))
            }
            None => {
                error!("Unknown job task failed: {}", e);
                None
            }
        },
    }
}
