//! Signed signup relay to an external endpoint.
//!
//! Form submissions leave the page as versioned JSON payloads with an
//! HMAC-SHA256 signature header, so the receiving endpoint can verify
//! origin and dedupe on event id. Delivery retries transient failures
//! with exponential backoff; a relay failure is surfaced to the caller
//! as a value, never a crash.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::error::WebhookError;

/// Schema version for relay payloads.
pub const PAYLOAD_VERSION: &str = "1.0";

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "X-Nudgekit-Signature";

/// Versioned signup payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupPayload {
    /// Schema version for backwards compatibility.
    pub version: String,
    /// Unique event ID for endpoint-side idempotency.
    pub event_id: String,
    /// When the visitor submitted the form.
    pub submitted_at: DateTime<Utc>,
    /// Submitted form fields, keyed by field name.
    pub fields: BTreeMap<String, String>,
}

impl SignupPayload {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: PAYLOAD_VERSION.to_string(),
            event_id: Uuid::new_v4().to_string(),
            submitted_at: now,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Serialize payload to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Compute the hex HMAC-SHA256 signature of a request body.
pub fn sign_body(body: &[u8], secret: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take keys of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Outcome of a successful relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayReceipt {
    /// Event ID the endpoint acknowledged.
    pub event_id: String,
    /// HTTP status the endpoint answered with.
    pub status: u16,
    /// How many attempts the delivery took.
    pub attempts: u32,
}

/// Relays signed signup payloads to the configured endpoint.
pub struct FormRelay {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl FormRelay {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Whether submissions can be relayed at all.
    pub fn is_configured(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    /// Deliver a signup payload, retrying transient failures.
    ///
    /// Non-success statuses and connection errors are retried up to
    /// `max_retries` total attempts with exponential backoff. The final
    /// failure comes back as a `Rejected` or `RequestFailed` value; the
    /// caller decides whether to tell the visitor.
    pub async fn submit(&self, payload: &SignupPayload) -> Result<RelayReceipt, WebhookError> {
        if !self.is_configured() {
            return Err(WebhookError::NotConfigured);
        }
        let url = Url::parse(&self.config.url).map_err(|err| WebhookError::InvalidUrl {
            url: self.config.url.clone(),
            message: err.to_string(),
        })?;

        let body = payload.to_bytes()?;
        let signature = if self.config.secret.is_empty() {
            None
        } else {
            Some(sign_body(&body, self.config.secret.as_bytes()))
        };

        let max_attempts = self.config.max_retries.max(1);
        let mut last_status = 0u16;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                // Exponential backoff: delay * 2^attempt
                let delay_ms = self.config.retry_delay_ms * (1 << attempt.min(6));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let mut request = self
                .client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(signature) = &signature {
                request = request.header(SIGNATURE_HEADER, signature.clone());
            }
            for (name, value) in &self.config.headers {
                request = request.header(name, value);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(RelayReceipt {
                        event_id: payload.event_id.clone(),
                        status: response.status().as_u16(),
                        attempts: attempt + 1,
                    });
                }
                Ok(response) => {
                    last_status = response.status().as_u16();
                    warn!(
                        status = last_status,
                        attempt = attempt + 1,
                        "signup relay rejected"
                    );
                }
                Err(err) => {
                    if attempt + 1 == max_attempts {
                        return Err(WebhookError::RequestFailed(err));
                    }
                    warn!(error = %err, attempt = attempt + 1, "signup relay attempt failed");
                }
            }
        }

        Err(WebhookError::Rejected {
            status: last_status,
            attempts: max_attempts,
        })
    }
}

impl std::fmt::Debug for FormRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormRelay")
            .field("url", &self.config.url)
            .field("enabled", &self.config.enabled)
            .finish_non_exhaustive()
    }
}
