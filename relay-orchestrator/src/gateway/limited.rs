//! Concurrency-limited gateway
//!
//! Wraps any gateway so that no more than a fixed number of provider calls are
//! in flight at once, across all jobs.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::domain::job::{JobId, PullRequestRef, WorkflowRunId};
use relay_core::domain::repo::{ForkHandle, RepoPath};
use tokio::sync::{Semaphore, SemaphorePermit};

use super::{DispatchRequest, GatewayError, RemoteGateway, Result, RunStatus};

pub struct RateLimitedGateway {
    inner: Arc<dyn RemoteGateway>,
    permits: Semaphore,
}

impl RateLimitedGateway {
    pub fn new(inner: Arc<dyn RemoteGateway>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_in_flight.max(1)),
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| GatewayError::RemoteUnavailable("gateway limiter closed".to_string()))
    }
}

#[async_trait]
impl RemoteGateway for RateLimitedGateway {
    async fn fork(&self, source: &RepoPath, target_owner: &str) -> Result<ForkHandle> {
        let _permit = self.acquire().await?;
        self.inner.fork(source, target_owner).await
    }

    async fn dispatch_workflow(
        &self,
        fork: &ForkHandle,
        request: &DispatchRequest,
    ) -> Result<WorkflowRunId> {
        let _permit = self.acquire().await?;
        self.inner.dispatch_workflow(fork, request).await
    }

    async fn poll_status(&self, run_id: WorkflowRunId) -> Result<RunStatus> {
        let _permit = self.acquire().await?;
        self.inner.poll_status(run_id).await
    }

    async fn find_pull_request(
        &self,
        source: &RepoPath,
        fork: &ForkHandle,
        job_id: JobId,
    ) -> Result<Option<PullRequestRef>> {
        let _permit = self.acquire().await?;
        self.inner.find_pull_request(source, fork, job_id).await
    }
}
