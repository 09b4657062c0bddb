//! Health DTOs

use serde::{Deserialize, Serialize};

/// Liveness answer with the orchestrator's admission state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Jobs holding an orchestration slot
    pub active_jobs: usize,
    /// Jobs waiting for a slot
    pub queued_jobs: usize,
}
