//! API Error Handling
//!
//! Unified error type for Façade responses. Every error answers with
//! `{"error": <message>, "reason": <machine code>}`; provider payloads never
//! reach the caller.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::domain::job::JobId;

use crate::repository::RegistryError;
use crate::service::{SignatureError, SubmitError, WebhookError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict {
        reason: &'static str,
        message: String,
    },
    Overloaded,
    Unauthorized(String),
    InternalError(String),
}

impl ApiError {
    pub fn job_not_found(id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("Job {} not found", id))
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Conflict { reason, .. } => (StatusCode::CONFLICT, *reason),
            ApiError::Overloaded => (StatusCode::TOO_MANY_REQUESTS, "overloaded"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = self.parts();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => {
                msg
            }
            ApiError::Conflict { message, .. } => message,
            ApiError::Overloaded => "Too many queued jobs, try again later".to_string(),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": message, "reason": reason })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => ApiError::job_not_found(id),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(e) => ApiError::BadRequest(e.to_string()),
            SubmitError::Duplicate { existing } => ApiError::Conflict {
                reason: "duplicate_submission",
                message: format!("Idempotency key already used by in-flight job {}", existing),
            },
            SubmitError::Overloaded => ApiError::Overloaded,
            SubmitError::Registry(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::NotFound(id) => ApiError::job_not_found(id),
            WebhookError::NotDispatched(id) => ApiError::Conflict {
                reason: "not_dispatched",
                message: format!("Job {} has not been dispatched", id),
            },
            WebhookError::Registry(e) => e.into(),
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Job ids arrive as path strings; anything that is not an id is unknown
pub fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::job_not_found(raw))
}

pub type ApiResult<T> = Result<T, ApiError>;
