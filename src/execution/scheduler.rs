//! Job scheduler - decides which jobs to dispatch next

use crate::core::JobSpec;
use std::collections::VecDeque;

/// Strategy for bounding concurrent jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One job at a time
    Sequential,

    /// Every job at once
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

impl SchedulingStrategy {
    /// Strategy for an optional `max_parallel` setting
    pub fn from_max_parallel(max_parallel: Option<usize>) -> Self {
        match max_parallel {
            None => SchedulingStrategy::Parallel,
            Some(1) => SchedulingStrategy::Sequential,
            Some(n) => SchedulingStrategy::LimitedParallel(n),
        }
    }

    /// Maximum jobs in flight for a run of `total` jobs (always at least 1)
    pub fn limit(&self, total: usize) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total.max(1),
            SchedulingStrategy::LimitedParallel(max) => (*max).max(1),
        }
    }
}

/// Tracks pending and running jobs for one run
///
/// Jobs leave the queue in expansion order. Once halted, nothing else is
/// dispatched and the remaining queue is handed back for cancellation.
pub struct JobScheduler {
    limit: usize,
    pending: VecDeque<JobSpec>,
    running: usize,
    halted: bool,
}

impl JobScheduler {
    pub fn new(strategy: SchedulingStrategy, jobs: Vec<JobSpec>) -> Self {
        Self {
            limit: strategy.limit(jobs.len()),
            pending: jobs.into(),
            running: 0,
            halted: false,
        }
    }

    /// Take the next batch of jobs that fits in the free slots
    pub fn next_jobs(&mut self) -> Vec<JobSpec> {
        if self.halted {
            return vec![];
        }

        let free = self.limit.saturating_sub(self.running);
        let take = free.min(self.pending.len());
        let batch: Vec<JobSpec> = self.pending.drain(..take).collect();
        self.running += batch.len();
        batch
    }

    /// Record that a dispatched job reached a terminal state
    pub fn job_finished(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    /// Stop dispatching new jobs
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check if there is anything left to dispatch or wait for
    pub fn has_more(&self) -> bool {
        self.running > 0 || (!self.halted && !self.pending.is_empty())
    }

    /// Remove every job never dispatched
    pub fn drain_pending(&mut self) -> Vec<JobSpec> {
        self.pending.drain(..).collect()
    }
}
