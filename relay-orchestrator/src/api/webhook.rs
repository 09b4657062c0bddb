//! Workflow Webhook Handler
//!
//! The agent workflow reports completion out-of-band. Reports are only
//! accepted with a valid `X-Hub-Signature-256` HMAC over the raw body.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use relay_core::dto::job::JobAck;
use relay_core::dto::webhook::WorkflowWebhook;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::signature::WEBHOOK_SIGNATURE_HEADER;

/// POST /webhook
/// Resolve a job from a workflow completion report
pub async fn workflow_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<JobAck>> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.verifier.verify(&body, signature) {
        tracing::warn!("Rejected webhook: {}", e);
        return Err(e.into());
    }

    let event: WorkflowWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    tracing::info!("Webhook for job {}: {:?}", event.job_id, event.status);
    let record = state.orchestrator.apply_webhook(event).await?;

    Ok(Json(JobAck::from(&record)))
}
