//! Remote Repository Gateway
//!
//! Adapter layer over the remote source-control/CI provider. The gateway only
//! reports what the provider said; deciding whether an error is retried, waited
//! out or fatal for the job belongs to the orchestrator.
//!
//! All gateways are trait-based so the orchestrator can be driven by a scripted
//! fake in tests.

mod github;
mod limited;

pub use github::{GitHubConfig, GitHubGateway};
pub use limited::RateLimitedGateway;

use async_trait::async_trait;
use relay_core::domain::job::{JobId, PullRequestRef, WorkflowRunId};
use relay_core::domain::repo::{ForkHandle, RepoPath};
use thiserror::Error;

/// Errors reported by a remote gateway
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The fork already exists; carries the existing fork
    #[error("Fork already exists: {fork}")]
    ForkConflict { fork: ForkHandle },

    /// The fork is not dispatch-capable yet
    #[error("Fork not ready: {0}")]
    NotReady(String),

    /// Transient provider failure (network, throttling, 5xx)
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The provider refused the workflow dispatch permanently
    #[error("Dispatch rejected: {0}")]
    DispatchRejected(String),

    /// Any other permanent refusal
    #[error("Remote rejected request: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Everything the workflow needs to run the agent for one job
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub job_id: JobId,
    pub source_repo: RepoPath,
    pub task_input: String,
}

/// Final outcome of a workflow run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub success: bool,
    /// Provider conclusion (e.g. `success`, `failure`, `cancelled`)
    pub conclusion: Option<String>,
    pub pull_request: Option<PullRequestRef>,
    pub run_url: Option<String>,
}

/// Observed state of a workflow run
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Running,
    Completed(RunOutcome),
    NotFound,
}

/// Remote repository gateway
///
/// Every operation is idempotent or safe to retry.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Forks `source` into `target_owner`
    ///
    /// Returns `ForkConflict` when the fork already exists.
    async fn fork(&self, source: &RepoPath, target_owner: &str) -> Result<ForkHandle>;

    /// Triggers the agent workflow against a fork
    ///
    /// Returns `NotReady` while the fork is still propagating.
    async fn dispatch_workflow(
        &self,
        fork: &ForkHandle,
        request: &DispatchRequest,
    ) -> Result<WorkflowRunId>;

    /// Fetches the current state of a workflow run
    async fn poll_status(&self, run_id: WorkflowRunId) -> Result<RunStatus>;

    /// Looks up the pull request the workflow opened for a job, if any
    async fn find_pull_request(
        &self,
        source: &RepoPath,
        fork: &ForkHandle,
        job_id: JobId,
    ) -> Result<Option<PullRequestRef>>;
}
