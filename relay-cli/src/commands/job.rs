//! Job command handlers
//!
//! Submission, status, cancellation, listing and watching of jobs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use colored::*;
use relay_client::{OrchestratorClient, WaitOptions};
use relay_core::domain::job::{CallbackState, JobStatus};
use relay_core::dto::job::{JobStatusResponse, SubmitJob};

use crate::config::Config;
use crate::id_resolver::resolve_job_id;
use crate::types::IdOrPrefix;

/// Arguments of `relay submit`
#[derive(Args)]
pub struct SubmitArgs {
    /// Source repository (owner/repo)
    pub repo: String,

    /// Task for the agent
    #[arg(long, short, conflicts_with = "task_file")]
    pub task: Option<String>,

    /// Read the task from a file
    #[arg(long)]
    pub task_file: Option<PathBuf>,

    /// Account that owns the fork (defaults to the orchestrator's bot account)
    #[arg(long)]
    pub owner: Option<String>,

    /// URL notified once the job finishes
    #[arg(long)]
    pub callback_url: Option<String>,

    /// Key that deduplicates submissions while a job is in flight
    #[arg(long)]
    pub idempotency_key: Option<String>,

    /// Wait for the job to finish
    #[arg(long)]
    pub wait: bool,
}

pub async fn submit(client: &OrchestratorClient, args: SubmitArgs, config: &Config) -> Result<()> {
    let task_input = match (args.task, args.task_file) {
        (Some(task), _) => task,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?,
        (None, None) => bail!("Either --task or --task-file is required"),
    };

    let ack = client
        .submit_job(&SubmitJob {
            source_repo: args.repo,
            target_owner: args.owner,
            task_input,
            callback_url: args.callback_url,
            idempotency_key: args.idempotency_key,
        })
        .await?;

    if config.json && !args.wait {
        println!("{}", serde_json::to_string_pretty(&ack)?);
        return Ok(());
    }
    if !config.json {
        println!("{} Job submitted", "✓".green());
        println!("  ID:     {}", ack.job_id.to_string().cyan());
        println!("  Status: {}", colorize_status(ack.status));
    }

    if args.wait {
        let job = client
            .wait_for_terminal(ack.job_id, WaitOptions::default())
            .await?;
        print_outcome(&job, config)?;
    }

    Ok(())
}

pub async fn status(client: &OrchestratorClient, id: &str, config: &Config) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;
    let job = client.get_job_status(job_id).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_job_details(&job);
    }

    Ok(())
}

pub async fn cancel(client: &OrchestratorClient, id: &str, config: &Config) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;
    let ack = client.cancel_job(job_id).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&ack)?);
    } else if ack.status.is_terminal() {
        println!(
            "{}",
            format!("Job {} already finished as {}", job_id, ack.status).yellow()
        );
    } else {
        println!("{} Cancellation requested for job {}", "✓".green(), job_id);
    }

    Ok(())
}

pub async fn list(client: &OrchestratorClient, status: Option<String>, config: &Config) -> Result<()> {
    let status = status
        .map(|raw| raw.to_uppercase().parse::<JobStatus>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let jobs = client.list_jobs(status).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in &jobs {
            print_job_summary(job);
        }
    }

    Ok(())
}

pub async fn watch(
    client: &OrchestratorClient,
    id: &str,
    interval: Duration,
    timeout: Option<Duration>,
    config: &Config,
) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;

    if !config.json {
        println!("{}", format!("Watching job {}...", job_id).dimmed());
    }
    let job = client
        .wait_for_terminal(job_id, WaitOptions { interval, timeout })
        .await?;

    print_outcome(&job, config)
}

/// Print a terminal job; a failed job makes the command fail
fn print_outcome(job: &JobStatusResponse, config: &Config) -> Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(job)?);
    } else {
        println!();
        print_job_details(job);
    }

    match job.status {
        JobStatus::Succeeded => Ok(()),
        status => Err(anyhow!("Job {} finished as {}", job.job_id, status)),
    }
}

fn print_job_summary(job: &JobStatusResponse) {
    println!("  {} Job {}", "▸".cyan(), job.job_id.to_string().dimmed());
    println!("    Repo:     {}", job.source_repo);
    println!("    Status:   {}", colorize_status(job.status));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if job.cancel_requested && !job.status.is_terminal() {
        println!("    {}", "cancellation requested".yellow());
    }
    println!();
}

fn print_job_details(job: &JobStatusResponse) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.job_id.to_string().cyan());
    println!("  Status:      {}", colorize_status(job.status));
    println!("  Repository:  {}", job.source_repo);
    if let Some(fork) = &job.fork_repo {
        println!("  Fork:        {}", fork);
    }
    if let Some(run_id) = job.workflow_run_id {
        println!("  Run:         {}", run_id);
    }
    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:     {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if job.attempt_count > 0 && !job.status.is_terminal() {
        println!("  Attempt:     {}", job.attempt_count);
    }
    if job.cancel_requested {
        println!("  Cancel:      {}", "requested".yellow());
    }

    match &job.callback {
        CallbackState::NotRequested => {}
        CallbackState::Pending => println!("  Callback:    {}", "pending".dimmed()),
        CallbackState::Delivered { attempts } => {
            println!("  Callback:    {} ({} attempt(s))", "delivered".green(), attempts)
        }
        CallbackState::Failed {
            attempts,
            last_error,
        } => println!(
            "  Callback:    {} after {} attempt(s): {}",
            "failed".red(),
            attempts,
            last_error
        ),
    }

    if let Some(result) = &job.result {
        println!("\n{}", "Result:".bold());
        println!(
            "  Success:      {}",
            if result.success {
                "✓".green()
            } else {
                "✗".red()
            }
        );
        if let Some(pr) = &result.pull_request {
            match &pr.url {
                Some(url) => println!("  Pull request: {} ({})", pr, url.cyan()),
                None => println!("  Pull request: {}", pr),
            }
        }
        if let Some(run_url) = &result.run_url {
            println!("  Run URL:      {}", run_url.dimmed());
        }
        if let Some(reason) = result.reason {
            println!("  Reason:       {}", reason.as_str().red());
        }
        if let Some(detail) = &result.detail {
            println!("\n{}", "Detail:".bold());
            println!("{}", detail.red());
        }
    }
}

fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Forking | JobStatus::Dispatched | JobStatus::Polling => status_str.cyan(),
        JobStatus::Succeeded => status_str.green(),
        JobStatus::Failed | JobStatus::TimedOut => status_str.red(),
    }
}
