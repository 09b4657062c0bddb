//! Relay HTTP Client
//!
//! A small, type-safe HTTP client for the Relay orchestrator API, shared by the
//! CLI and by services that submit agent jobs programmatically.
//!
//! # Example
//!
//! ```no_run
//! use relay_client::OrchestratorClient;
//! use relay_core::dto::job::SubmitJob;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let ack = client.submit_job(&SubmitJob {
//!         source_repo: "org/repo".to_string(),
//!         target_owner: None,
//!         task_input: "fix bug X".to_string(),
//!         callback_url: None,
//!         idempotency_key: None,
//!     }).await?;
//!
//!     println!("Submitted job: {}", ack.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;

pub use error::{ClientError, Result};
pub use jobs::WaitOptions;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Relay orchestrator API
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use relay_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code, then deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_body(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
