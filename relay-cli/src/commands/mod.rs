//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;

pub use job::SubmitArgs;

use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job for an agent to work on
    Submit(SubmitArgs),
    /// Show the current state of a job
    Status {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Request cancellation of a job
    Cancel {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// List jobs
    List {
        /// Only jobs in this status (e.g. POLLING, FAILED)
        #[arg(long)]
        status: Option<String>,
    },
    /// Follow a job until it finishes
    Watch {
        /// Job ID or unambiguous prefix
        id: String,

        /// Seconds between status checks
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Check that the orchestrator is up
    Health,
}

/// Route a command to its handler
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Submit(args) => job::submit(&client, args, config).await,
        Commands::Status { id } => job::status(&client, &id, config).await,
        Commands::Cancel { id } => job::cancel(&client, &id, config).await,
        Commands::List { status } => job::list(&client, status, config).await,
        Commands::Watch {
            id,
            interval,
            timeout,
        } => {
            job::watch(
                &client,
                &id,
                Duration::from_secs(interval.max(1)),
                timeout.map(Duration::from_secs),
                config,
            )
            .await
        }
        Commands::Health => {
            let health = client.health().await?;
            if config.json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!(
                    "{} Orchestrator at {} is {}",
                    "✓".green(),
                    client.base_url(),
                    health.status.green()
                );
                println!("  Active jobs: {}", health.active_jobs);
                println!("  Queued jobs: {}", health.queued_jobs);
            }
            Ok(())
        }
    }
}
