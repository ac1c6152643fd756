use anyhow::{Context, Result};
use matrix_ci::cli::commands::{ExpandCommand, HistoryCommand, RunCommand, ValidateCommand};
use matrix_ci::cli::output::*;
use matrix_ci::cli::{Cli, Command};
use matrix_ci::core::{
    config::WorkflowConfig, JobStatus, RunResult, StepStatus, Trigger, Workflow,
};
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent, PipelineRunner};
use matrix_ci::persistence::{create_summary, PersistenceBackend};
use matrix_ci::provision::{LocalProvisioner, LocalProvisionerConfig};
use matrix_ci::reporting::{forward_artifacts, DirectoryUploader, NullUploader, ReportUploader};
use matrix_ci::secrets::EnvSecretProvider;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    let success = match &cli.command {
        Command::Expand(cmd) => expand_matrix(&cli.config, cmd)?,
        Command::Run(cmd) => run_matrix(&cli.config, cmd).await?,
        Command::Validate(cmd) => validate_workflow(&cli.config, cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

fn load_workflow(path: &str) -> Result<Workflow> {
    let config = WorkflowConfig::from_file(path)
        .with_context(|| format!("Failed to load workflow config {}", path))?;
    Ok(config.to_workflow()?)
}

fn expand_matrix(path: &str, cmd: &ExpandCommand) -> Result<bool> {
    let workflow = load_workflow(path)?;
    let jobs = workflow.jobs()?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(true);
    }

    println!(
        "{} {} expands to {} jobs:",
        INFO,
        style(&workflow.name).bold(),
        style(jobs.len()).cyan()
    );
    for job in &jobs {
        println!("{}", format_job(job));
    }

    Ok(true)
}

async fn run_matrix(path: &str, cmd: &RunCommand) -> Result<bool> {
    let mut workflow = load_workflow(path)?;
    let quiet = cmd.json;

    if !quiet {
        println!("{} Loaded workflow: {}", INFO, style(&workflow.name).bold());
    }

    // Apply variable overrides
    for (key, value) in &cmd.variables {
        workflow.variables.insert(key.clone(), value.clone());
        if !quiet {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    let trigger = Trigger::new(&cmd.event, &cmd.revision);
    if !workflow.accepts(&trigger.event) {
        let notice = format!(
            "{} {} does not run on '{}' events, nothing to do",
            INFO,
            style(&workflow.name).bold(),
            trigger.event
        );
        // Keep stdout parseable under --json
        if quiet {
            eprintln!("{}", notice);
        } else {
            println!("{}", notice);
        }
        return Ok(true);
    }

    let jobs = workflow.jobs()?;
    let (strategy, fail_fast) = cmd.strategy(&workflow.strategy);

    let secrets = EnvSecretProvider::new();
    let scrubbed: Vec<String> = workflow
        .secret_names()
        .into_iter()
        .map(|name| secrets.variable_name(name))
        .collect();
    let runner = PipelineRunner::new(
        LocalProvisioner::new(LocalProvisionerConfig::new().with_scrubbed_env(scrubbed)),
        workflow.provision.clone(),
    )
    .with_context(workflow.context(&trigger));
    let engine = ExecutionEngine::new(runner, workflow.steps.clone(), Arc::new(secrets));

    let progress = (!quiet).then(|| create_progress_bar(jobs.len()));
    if let Some(progress) = progress.clone() {
        engine
            .add_event_handler(move |event| {
                if matches!(
                    event,
                    ExecutionEvent::JobFinished { .. } | ExecutionEvent::JobCancelled { .. }
                ) {
                    progress.inc(1);
                }
                if let Some(line) = format_execution_event(&event) {
                    progress.println(line);
                }
            })
            .await;
    }

    let mut result = engine.run(jobs, strategy, fail_fast).await;
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }

    // Forward artifacts
    let uploader: Box<dyn ReportUploader> = match cmd
        .artifacts_dir
        .clone()
        .or_else(|| workflow.reporting.directory.clone())
    {
        Some(dir) => Box::new(DirectoryUploader::new(dir)),
        None => Box::new(NullUploader),
    };
    forward_artifacts(&mut result, uploader.as_ref(), workflow.reporting.fail_on_error).await;

    // Save to history
    if !cmd.no_history {
        let summary = create_summary(&workflow.name, &trigger, &result);
        match open_history().await {
            Ok(store) => match store.save_run(&summary).await {
                Ok(()) if !quiet => println!(
                    "{} Run saved to history (ID: {})",
                    INFO,
                    style(&summary.run_id.to_string()[..8]).dim()
                ),
                Ok(()) => {}
                Err(e) => warn!("Failed to save run to history: {:#}", e),
            },
            Err(e) => warn!("Run history unavailable: {:#}", e),
        }
    }

    if quiet {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_run_result(&workflow.name, &result);
    }

    Ok(result.is_success())
}

fn print_run_result(name: &str, result: &RunResult) {
    println!("\n{}", format_job_table(result));

    for outcome in result.outcomes.iter().filter(|o| o.status == JobStatus::Failed) {
        let failed_step = outcome
            .steps
            .iter()
            .find(|s| s.status == StepStatus::Failed && !s.stderr.trim().is_empty());
        if let Some(step) = failed_step {
            println!(
                "\n{} {} step {}:\n{}",
                CROSS,
                style(&outcome.job).bold(),
                style(&step.name).red(),
                format_output(step.stderr.trim_end(), 10)
            );
        }
    }

    for error in &result.reporting_errors {
        println!("{} Reporting: {}", WARN, style(error).dim());
    }

    println!(
        "\n{} succeeded, {} failed, {} cancelled",
        style(result.count(JobStatus::Succeeded)).green(),
        style(result.count(JobStatus::Failed)).red(),
        style(result.count(JobStatus::Cancelled)).yellow()
    );

    if result.is_success() {
        println!("{} {} completed {}", CHECK, style(name).bold(), style("successfully").green());
    } else {
        println!("{} {} {}", CROSS, style(name).bold(), style("failed").red());
    }
}

fn validate_workflow(path: &str, cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating workflow...", INFO);

    let result = load_workflow(path).and_then(|workflow| {
        let jobs = workflow.jobs()?;
        Ok((workflow, jobs))
    });

    match result {
        Ok((workflow, jobs)) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&workflow.name).bold());
            println!("  Axes: {}", style(workflow.axes.len()).cyan());
            println!("  Jobs: {}", style(jobs.len()).cyan());
            println!("  Steps: {}", style(workflow.steps.len()).cyan());
            println!("  Variables: {}", style(workflow.variables.len()).cyan());

            let secrets = workflow.secret_names();
            if !secrets.is_empty() {
                println!("  Secrets: {}", style(secrets.join(", ")).cyan());
            }

            if cmd.json {
                let data = serde_json::json!({
                    "name": workflow.name,
                    "triggers": workflow.triggers,
                    "jobs": jobs,
                    "steps": workflow.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                    "secrets": secrets,
                });
                println!("\n{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(false)
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<bool> {
    let store = open_history().await?;

    if let Some(run_id) = cmd.run {
        let Some(summary) = store.load_run(run_id).await? else {
            println!("{} No run with ID {}", CROSS, run_id);
            return Ok(false);
        };
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{}", format_run_summary(&summary));
        }
        return Ok(true);
    }

    if cmd.workflows {
        let names = store.list_workflows().await?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "workflows": names }))?);
        } else if names.is_empty() {
            println!("{} No runs found", INFO);
        } else {
            for name in &names {
                println!("  {}", style(name).bold());
            }
        }
        return Ok(true);
    }

    let runs = store.list_runs(cmd.workflow.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(true);
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(true)
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Box<dyn PersistenceBackend>> {
    let store = matrix_ci::persistence::SqliteRunStore::with_default_path().await?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Box<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature, history is not kept across runs");
    Ok(Box::new(matrix_ci::persistence::InMemoryPersistence::new()))
}
