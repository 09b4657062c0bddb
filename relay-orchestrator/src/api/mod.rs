//! API Module
//!
//! HTTP Façade of the orchestrator.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod job;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{Orchestrator, WebhookVerifier};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub verifier: Arc<WebhookVerifier>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, verifier: WebhookVerifier) -> Self {
        Self {
            orchestrator,
            verifier: Arc::new(verifier),
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/submit", post(job::submit_job))
        .route("/status/{job_id}", get(job::get_status))
        .route("/cancel/{job_id}", post(job::cancel_job))
        .route("/jobs", get(job::list_jobs))
        // Workflow completion reports
        .route("/webhook", post(webhook::workflow_webhook))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
