//! Workflow webhook DTOs
//!
//! The agent workflow reports its own completion to the orchestrator with
//! this payload, independently of the orchestrator's polling.

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, WorkflowRunId};

/// Status reported by the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Running,
    Completed,
    Failed,
}

/// Completion report posted by the workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowWebhook {
    pub job_id: JobId,
    pub status: WebhookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<WorkflowRunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
