//! Error types for the Relay client

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Relay client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Machine-readable reason from the error body, when present
        reason: Option<String>,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Gave up waiting for a job
    #[error("Timed out waiting for job {0}")]
    WaitTimeout(String),
}

/// Error body the orchestrator answers with
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    reason: Option<String>,
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            reason: None,
            message: message.into(),
        }
    }

    /// Build an API error from a raw response body
    ///
    /// Structured `{"error", "reason"}` bodies are unpacked; anything else is
    /// kept verbatim as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::ApiError {
                status,
                reason: parsed.reason,
                message: parsed.error,
            },
            Err(_) => Self::api_error(status, body),
        }
    }

    /// Machine-readable reason, if the API sent one
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::ApiError { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is an idempotency-key conflict
    pub fn is_duplicate(&self) -> bool {
        self.reason() == Some("duplicate_submission")
    }

    /// Check if the orchestrator refused work because it is saturated
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Self::ApiError { status: 429, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}
