//! Job DTOs for the orchestrator API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{CallbackState, JobId, JobRecord, JobResult, JobStatus, WorkflowRunId};

/// Request to submit a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    pub source_repo: String,
    /// Account or organisation owning the fork; the orchestrator's bot account when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_owner: Option<String>,
    pub task_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Acknowledgement returned by submit and cancel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAck {
    pub job_id: JobId,
    pub status: JobStatus,
}

impl From<&JobRecord> for JobAck {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
        }
    }
}

/// Public view of a job
///
/// Leaves out the task input and the callback URL the caller supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<JobResult>,
    pub source_repo: String,
    #[serde(default)]
    pub fork_repo: Option<String>,
    #[serde(default)]
    pub workflow_run_id: Option<WorkflowRunId>,
    pub callback: CallbackState,
    pub cancel_requested: bool,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
            result: record.result,
            source_repo: record.source_repo.to_string(),
            fork_repo: record.fork.map(|fork| fork.repo.to_string()),
            workflow_run_id: record.workflow_run_id,
            callback: record.callback,
            cancel_requested: record.cancel_requested,
            attempt_count: record.attempt_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Body posted to a caller's callback URL once a job is terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result: Option<JobResult>,
}

impl From<&JobRecord> for CallbackPayload {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
            result: record.result.clone(),
        }
    }
}
