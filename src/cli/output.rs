//! CLI output formatting

use crate::{
    core::{JobOutcome, JobSpec, JobStatus, RunResult, RunStatus, StepStatus},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the jobs of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a job status for display
pub fn format_job_status(status: JobStatus) -> String {
    match status {
        JobStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        JobStatus::Failed => style("FAILED").red().to_string(),
        JobStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run status for display
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Passed => style("passed").green().to_string(),
        StepStatus::Failed => style("failed").red().to_string(),
        StepStatus::Skipped => style("skipped").dim().to_string(),
    }
}

/// One line per expanded job
pub fn format_job(job: &JobSpec) -> String {
    let mut line = format!(
        "  {} {}",
        style(format!("#{:<3}", job.index)).dim(),
        style(job.label()).bold()
    );
    if job.continue_on_error {
        line.push_str(&format!(" {}", style("(continue on error)").yellow()));
    }
    line
}

/// Status table for every job of a run, with the first failing step of
/// each failed job
pub fn format_job_table(result: &RunResult) -> String {
    let width = result
        .outcomes
        .iter()
        .map(|o| o.job.label().len())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::with_capacity(result.outcomes.len());
    for outcome in &result.outcomes {
        let icon = match outcome.status {
            JobStatus::Succeeded => CHECK,
            JobStatus::Failed if !outcome.counts_as_failure() => WARN,
            JobStatus::Failed => CROSS,
            JobStatus::Cancelled => SKIP,
        };

        let mut line = format!(
            "  {}{:<4} {:<width$}  {:<9}  {}",
            icon,
            format!("#{}", outcome.job.index),
            outcome.job.label(),
            format_job_status(outcome.status),
            style(format_duration(Duration::from_millis(outcome.duration_ms()))).dim(),
            width = width
        );
        if let Some(detail) = failure_detail(outcome) {
            line.push_str(&format!("\n      {}", style(detail).dim()));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn failure_detail(outcome: &JobOutcome) -> Option<String> {
    if outcome.status != JobStatus::Failed {
        return None;
    }
    outcome.error.clone()
}

/// Format a stored run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
    };

    let duration = summary
        .completed_at
        .signed_duration_since(summary.started_at)
        .to_std()
        .unwrap_or_default();

    format!(
        "{} {} - {} - {} - {} {} - {}/{} succeeded, {} failed, {} cancelled - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.workflow_name).bold(),
        format_run_status(summary.status),
        style(&summary.event).cyan(),
        style(short_revision(&summary.revision)).dim(),
        summary.succeeded,
        summary.total_jobs,
        summary.failed,
        summary.cancelled,
        style(format_duration(duration)).dim()
    )
}

fn short_revision(revision: &str) -> &str {
    revision.get(..8).unwrap_or(revision)
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::RunStarted {
            total_jobs,
            max_parallel,
        } => Some(format!(
            "{} Running {} jobs ({} at a time)",
            ROCKET,
            style(total_jobs).bold(),
            style(max_parallel).cyan()
        )),
        ExecutionEvent::JobStarted { job } => {
            Some(format!("{} {}", SPINNER, style(job).cyan()))
        }
        ExecutionEvent::ProvisionRetrying {
            job,
            attempt,
            max_attempts,
            error,
        } => Some(format!(
            "{} {} provisioning (attempt {}/{}): {}",
            WARN,
            style(job).yellow(),
            attempt,
            max_attempts,
            style(error).dim()
        )),
        ExecutionEvent::StepFinished {
            job, step, status, ..
        } => match status {
            StepStatus::Failed => Some(format!(
                "{} {} step {} {}",
                CROSS,
                style(job).dim(),
                style(step).red(),
                format_step_status(*status)
            )),
            _ => None,
        },
        ExecutionEvent::JobFinished {
            job,
            status,
            duration_ms,
        } => {
            let icon = if *status == JobStatus::Succeeded { CHECK } else { CROSS };
            Some(format!(
                "{} {} {} ({})",
                icon,
                style(job).bold(),
                format_job_status(*status),
                style(format_duration(Duration::from_millis(*duration_ms))).dim()
            ))
        }
        ExecutionEvent::JobCancelled { job } => Some(format!(
            "{} {} {}",
            SKIP,
            style(job).dim(),
            format_job_status(JobStatus::Cancelled)
        )),
        ExecutionEvent::RunCompleted { run_id, status } => Some(format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_run_status(*status)
        )),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
