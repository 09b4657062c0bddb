//! Job-related API endpoints

use std::time::Duration;

use relay_core::domain::job::{JobId, JobStatus};
use relay_core::dto::health::HealthResponse;
use relay_core::dto::job::{JobAck, JobStatusResponse, SubmitJob};
use tokio::time::Instant;

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};

/// How `wait_for_terminal` polls the status endpoint
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub interval: Duration,
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

impl OrchestratorClient {
    /// Submit a job
    ///
    /// The acknowledgement carries the new job id and its `PENDING` status.
    pub async fn submit_job(&self, req: &SubmitJob) -> Result<JobAck> {
        let response = self.client.post(self.url("/submit")).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Get the current state of a job
    pub async fn get_job_status(&self, job_id: JobId) -> Result<JobStatusResponse> {
        let url = self.url(&format!("/status/{}", job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a job
    ///
    /// Cancellation is best effort; the job resolves at its next checkpoint.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<JobAck> {
        let url = self.url(&format!("/cancel/{}", job_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, optionally only those in `status`
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobStatusResponse>> {
        let mut request = self.client.get(self.url("/jobs"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.client.get(self.url("/health")).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it reaches a terminal status
    pub async fn wait_for_terminal(
        &self,
        job_id: JobId,
        options: WaitOptions,
    ) -> Result<JobStatusResponse> {
        let started = Instant::now();

        loop {
            let job = self.get_job_status(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tracing::debug!("Job {} is {}, waiting", job_id, job.status);

            if let Some(timeout) = options.timeout {
                if started.elapsed() + options.interval > timeout {
                    return Err(ClientError::WaitTimeout(job_id.to_string()));
                }
            }
            tokio::time::sleep(options.interval).await;
        }
    }
}
