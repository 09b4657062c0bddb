//! Health Check API Handler
//!
//! Liveness plus a glance at the admission state.

use axum::{Json, extract::State};
use relay_core::dto::health::HealthResponse;

use super::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_jobs: state.orchestrator.active_jobs(),
        queued_jobs: state.orchestrator.queued_jobs(),
    })
}
