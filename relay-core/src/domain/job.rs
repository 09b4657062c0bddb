//! Job domain types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::repo::{ForkHandle, RepoPath};

/// Unique job identifier, generated at submission and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a remote workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowRunId(pub u64);

impl fmt::Display for WorkflowRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Job lifecycle status
///
/// `Succeeded`, `Failed` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Forking,
    Dispatched,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    /// Whether a workflow run has been triggered for a job in this status
    pub fn is_dispatched(self) -> bool {
        matches!(self, Self::Dispatched | Self::Polling)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Forking => "FORKING",
            Self::Dispatched => "DISPATCHED",
            Self::Polling => "POLLING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "FORKING" => Ok(Self::Forking),
            "DISPATCHED" => Ok(Self::Dispatched),
            "POLLING" => Ok(Self::Polling),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "TIMED_OUT" => Ok(Self::TimedOut),
            _ => Err(format!("unknown job status '{}'", s)),
        }
    }
}

/// Machine-readable reason recorded on failed or timed-out jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ForkFailed,
    DispatchRejected,
    DispatchRetriesExhausted,
    WorkflowFailed,
    WorkflowNotFound,
    RemoteRejected,
    TimedOut,
    Cancelled,
    Interrupted,
    InternalError,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForkFailed => "fork_failed",
            Self::DispatchRejected => "dispatch_rejected",
            Self::DispatchRetriesExhausted => "dispatch_retries_exhausted",
            Self::WorkflowFailed => "workflow_failed",
            Self::WorkflowNotFound => "workflow_not_found",
            Self::RemoteRejected => "remote_rejected",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Interrupted => "interrupted",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a pull request produced by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub repo: RepoPath,
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PullRequestRef {
    /// Parses a web URL of the form `https://github.com/owner/repo/pull/42`
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url
            .trim()
            .strip_prefix("https://")
            .or_else(|| url.trim().strip_prefix("http://"))?;
        let mut segments = path.trim_end_matches('/').split('/').skip(1);
        let owner = segments.next()?;
        let name = segments.next()?;
        if segments.next()? != "pull" {
            return None;
        }
        let number = segments.next()?.parse().ok()?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            repo: RepoPath::parse(&format!("{}/{}", owner, name)).ok()?,
            number,
            url: Some(url.trim().to_string()),
        })
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Outcome of a job, present once the job is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
}

impl JobResult {
    pub fn succeeded(pull_request: Option<PullRequestRef>) -> Self {
        Self {
            success: true,
            pull_request,
            reason: None,
            detail: None,
            run_url: None,
        }
    }

    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            pull_request: None,
            reason: Some(reason),
            detail: Some(detail.into()),
            run_url: None,
        }
    }

    pub fn timed_out(detail: impl Into<String>) -> Self {
        Self::failed(FailureReason::TimedOut, detail)
    }

    pub fn with_run_url(mut self, run_url: Option<String>) -> Self {
        self.run_url = run_url;
        self
    }
}

/// Delivery state of the terminal callback, kept on the job itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallbackState {
    NotRequested,
    Pending,
    Delivered { attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

/// Job record
///
/// One dispatch request from submission to terminal resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub source_repo: RepoPath,
    pub target_owner: String,
    pub task_input: String,
    #[serde(default)]
    pub fork: Option<ForkHandle>,
    #[serde(default)]
    pub workflow_run_id: Option<WorkflowRunId>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub callback_url: Option<String>,
    pub callback: CallbackState,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Retry counter of the current step; reset on every step change
    pub attempt_count: u32,
}

/// Everything needed to create a job record
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub source_repo: RepoPath,
    pub target_owner: String,
    pub task_input: String,
    pub callback_url: Option<String>,
    pub idempotency_key: Option<String>,
}

impl JobRecord {
    /// Creates a fresh `PENDING` record
    pub fn new(job: NewJob) -> Self {
        let now = Utc::now();
        let callback = if job.callback_url.is_some() {
            CallbackState::Pending
        } else {
            CallbackState::NotRequested
        };

        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            source_repo: job.source_repo,
            target_owner: job.target_owner,
            task_input: job.task_input,
            fork: None,
            workflow_run_id: None,
            result: None,
            callback_url: job.callback_url,
            callback,
            idempotency_key: job.idempotency_key,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            attempt_count: 0,
        }
    }

    /// Checks the record-level invariants
    ///
    /// A workflow run id may only exist once the job has been dispatched,
    /// and a result exists exactly when the status is terminal.
    pub fn check_invariants(&self) -> Result<(), String> {
        let pre_dispatch = matches!(self.status, JobStatus::Pending | JobStatus::Forking);
        if self.status.is_dispatched() && self.workflow_run_id.is_none() {
            return Err(format!("{} job has no workflow run id", self.status));
        }
        if pre_dispatch && self.workflow_run_id.is_some() {
            return Err(format!("{} job already has a workflow run id", self.status));
        }
        if self.status.is_terminal() != self.result.is_some() {
            return Err(format!(
                "{} job {} a result",
                self.status,
                if self.result.is_some() { "has" } else { "lacks" }
            ));
        }
        Ok(())
    }
}

/// Branch the agent workflow pushes its changes to
pub fn agent_branch(job_id: JobId) -> String {
    format!("relay/{}", job_id)
}
