//! HMAC-SHA256 payload signatures
//!
//! Inbound workflow webhooks carry `X-Hub-Signature-256: sha256=<hex>`; outbound
//! callbacks are signed the same way in `X-Relay-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const CALLBACK_SIGNATURE_HEADER: &str = "x-relay-signature";

const PREFIX: &str = "sha256=";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignatureError {
    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Webhook secret not configured")]
    NotConfigured,

    #[error("Missing signature header")]
    Missing,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Signs `payload` and returns the header value (`sha256=<hex>`)
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(payload);
    Ok(format!(
        "{}{}",
        PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn mac_for(secret: &str) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)
}

/// Verifies inbound webhook signatures
#[derive(Debug, Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
    allow_insecure: bool,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, allow_insecure: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            allow_insecure,
        }
    }

    /// Without a secret, payloads pass only when insecure webhooks are allowed
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            if self.allow_insecure {
                return Ok(());
            }
            return Err(SignatureError::NotConfigured);
        };

        let header = header.ok_or(SignatureError::Missing)?;
        let digest = header
            .trim()
            .strip_prefix(PREFIX)
            .ok_or(SignatureError::Malformed)?;
        let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

        let mut mac = mac_for(secret)?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}
