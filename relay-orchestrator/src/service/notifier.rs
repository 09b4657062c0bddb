//! Callback Notifier
//!
//! Best-effort delivery of a job's terminal record to the caller's
//! `callback_url`. The outcome is returned as a `CallbackState` for the
//! orchestrator to record on the job; it never influences the job's status.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::domain::job::{CallbackState, JobRecord};
use relay_core::dto::job::CallbackPayload;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::policy::RetryPolicy;
use super::signature::{self, CALLBACK_SIGNATURE_HEADER};

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Deliver `record` to its callback URL, retrying per policy
    async fn notify(&self, record: &JobRecord) -> CallbackState;
}

/// Delivers callbacks as signed JSON `POST` requests
pub struct HttpCallbackNotifier {
    client: reqwest::Client,
    policy: RetryPolicy,
    secret: Option<String>,
}

enum Attempt {
    Delivered,
    Retry(String),
    GiveUp(String),
}

impl HttpCallbackNotifier {
    pub fn new(
        policy: RetryPolicy,
        timeout: Duration,
        secret: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relay-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            policy,
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    async fn attempt(&self, url: &str, body: &[u8]) -> Attempt {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec());

        if let Some(secret) = &self.secret {
            match signature::sign(secret, body) {
                Ok(value) => request = request.header(CALLBACK_SIGNATURE_HEADER, value),
                Err(e) => return Attempt::GiveUp(e.to_string()),
            }
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Attempt::Delivered,
            Ok(resp) => {
                let status = resp.status();
                let error = format!("callback endpoint returned {}", status);
                if is_retryable(status) {
                    Attempt::Retry(error)
                } else {
                    Attempt::GiveUp(error)
                }
            }
            Err(e) => Attempt::Retry(format!("callback request failed: {}", e)),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl CallbackNotifier for HttpCallbackNotifier {
    async fn notify(&self, record: &JobRecord) -> CallbackState {
        let Some(url) = record.callback_url.as_deref() else {
            return CallbackState::NotRequested;
        };

        let body = match serde_json::to_vec(&CallbackPayload::from(record)) {
            Ok(body) => body,
            Err(e) => {
                return CallbackState::Failed {
                    attempts: 0,
                    last_error: format!("could not encode callback: {}", e),
                };
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!("Delivering callback for job {} (attempt {})", record.id, attempts);

            let last_error = match self.attempt(url, &body).await {
                Attempt::Delivered => {
                    info!("Callback for job {} delivered", record.id);
                    return CallbackState::Delivered { attempts };
                }
                Attempt::GiveUp(error) => {
                    warn!("Callback for job {} rejected: {}", record.id, error);
                    return CallbackState::Failed {
                        attempts,
                        last_error: error,
                    };
                }
                Attempt::Retry(error) => error,
            };

            match self.policy.next_delay(attempts) {
                Some(delay) => {
                    warn!(
                        "Callback for job {} failed ({}), retrying in {:?}",
                        record.id, last_error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        "Giving up on callback for job {} after {} attempts: {}",
                        record.id, attempts, last_error
                    );
                    return CallbackState::Failed {
                        attempts,
                        last_error,
                    };
                }
            }
        }
    }
}
