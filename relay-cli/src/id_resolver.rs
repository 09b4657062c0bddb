//! ID resolver module
//!
//! Resolves job id prefixes to full ids by listing jobs through the API, so
//! users can type a short prefix instead of a whole UUID.

use anyhow::{Context, Result, anyhow};
use relay_client::OrchestratorClient;
use relay_core::domain::job::JobId;
use relay_core::dto::job::JobStatusResponse;

use crate::types::IdOrPrefix;

/// Resolve a job id or prefix to a full id
///
/// # Errors
/// Returns an error if no job or more than one job matches the prefix, or if
/// the job list cannot be fetched.
pub async fn resolve_job_id(client: &OrchestratorClient, id_or_prefix: &IdOrPrefix) -> Result<JobId> {
    if let Some(id) = id_or_prefix.as_id() {
        return Ok(id);
    }

    let jobs = client
        .list_jobs(None)
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(&jobs, &id_or_prefix.to_string())
}

fn match_prefix(jobs: &[JobStatusResponse], prefix: &str) -> Result<JobId> {
    if prefix.is_empty() {
        return Err(anyhow!("Job ID must not be empty"));
    }

    let matches: Vec<JobId> = jobs
        .iter()
        .map(|job| job.job_id)
        .filter(|id| id.to_string().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
