//! Submission validation
//!
//! Turns a raw `SubmitJob` request into a `NewJob` the registry accepts, or
//! explains why it cannot.

use relay_core::domain::job::NewJob;
use relay_core::domain::repo::RepoPath;
use relay_core::dto::job::SubmitJob;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid repository path: {0:?} (expected owner/repo)")]
    InvalidRepoPath(String),

    #[error("Invalid target owner: {0:?}")]
    InvalidTargetOwner(String),

    #[error("Task input cannot be empty")]
    EmptyTaskInput,

    #[error("Invalid callback_url: {0}")]
    InvalidCallbackUrl(String),

    #[error("Idempotency key cannot be empty")]
    EmptyIdempotencyKey,
}

/// Validate a submission, filling in `default_owner` when no target owner is given
pub fn validate_submission(
    req: SubmitJob,
    default_owner: &str,
) -> Result<NewJob, ValidationError> {
    let source_repo = RepoPath::parse(req.source_repo.trim())
        .map_err(|_| ValidationError::InvalidRepoPath(req.source_repo.clone()))?;

    let target_owner = match req.target_owner {
        Some(owner) => owner.trim().to_string(),
        None => default_owner.to_string(),
    };
    if !is_valid_owner(&target_owner) {
        return Err(ValidationError::InvalidTargetOwner(target_owner));
    }

    if req.task_input.trim().is_empty() {
        return Err(ValidationError::EmptyTaskInput);
    }

    let callback_url = match req.callback_url {
        Some(url) => Some(validate_callback_url(&url)?),
        None => None,
    };

    let idempotency_key = match req.idempotency_key {
        Some(key) if key.trim().is_empty() => return Err(ValidationError::EmptyIdempotencyKey),
        other => other,
    };

    Ok(NewJob {
        source_repo,
        target_owner,
        task_input: req.task_input,
        callback_url,
        idempotency_key,
    })
}

fn is_valid_owner(owner: &str) -> bool {
    !owner.is_empty()
        && owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Callback URLs must be absolute `http(s)` URLs with a host
pub fn validate_callback_url(url: &str) -> Result<String, ValidationError> {
    if url.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidCallbackUrl(
            "must not contain whitespace".to_string(),
        ));
    }

    let parsed =
        Url::parse(url).map_err(|e| ValidationError::InvalidCallbackUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidCallbackUrl(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::InvalidCallbackUrl(
            "missing host".to_string(),
        ));
    }

    Ok(url.to_string())
}
