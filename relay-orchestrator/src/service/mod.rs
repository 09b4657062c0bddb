//! Service Module
//!
//! Orchestration logic: the job state machine, the retry policies it runs on,
//! callback delivery and the checks applied to incoming requests.

pub mod notifier;
pub mod orchestrator;
pub mod policy;
pub mod signature;
pub mod validation;

// Re-export for convenience
pub use notifier::{CallbackNotifier, HttpCallbackNotifier};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SubmitError, WebhookError};
pub use policy::{OrchestratorPolicies, PollPolicy, RetryPolicy};
pub use signature::{SignatureError, WebhookVerifier};
pub use validation::ValidationError;
