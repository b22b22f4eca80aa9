#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Push delivery for blockwatch alerts.
//!
//! Three pieces:
//!
//! - [`registry`] — compile-time TOML configuration of the push provider
//!   (endpoint, Android appearance, auth settings) with env overrides.
//! - [`credentials`] — the OAuth2 service-account exchange and the cached
//!   bearer token behind [`credentials::CredentialProvider`].
//! - [`PushClient`] — sends one [`payload::PushPayload`] per recipient
//!   over HTTPS with a small bounded retry budget for transient failures.

pub mod credentials;
pub mod payload;
pub mod registry;

use std::time::Duration;

use payload::PushPayload;
use registry::PushProviderConfig;

/// Maximum length of the response body included in delivery errors.
const BODY_SNIPPET_LEN: usize = 300;

/// Errors from push delivery operations.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credential material is invalid or the token exchange failed.
    #[error("credential error: {message}")]
    Credential {
        /// Description of the credential failure.
        message: String,
    },

    /// The provider rejected a delivery.
    #[error("delivery failed with {status}: {body}")]
    Delivery {
        /// HTTP status returned by the provider.
        status: reqwest::StatusCode,
        /// Truncated response body.
        body: String,
    },

    /// Provider registry configuration problem.
    #[error("provider registry error: {message}")]
    Registry {
        /// Description of the registry failure.
        message: String,
    },
}

/// HTTPS client for one push provider endpoint.
pub struct PushClient {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl PushClient {
    /// Builds a client for the given provider and project.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Registry`] if the provider is disabled, or
    /// [`PushError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(provider: &PushProviderConfig, project_id: &str) -> Result<Self, PushError> {
        if !provider.enabled {
            return Err(PushError::Registry {
                message: format!("push provider '{}' is disabled", provider.id),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.delivery.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: provider.delivery.endpoint_for_project(project_id),
            retry_attempts: provider.delivery.retry_attempts,
            retry_backoff: Duration::from_millis(provider.delivery.retry_backoff_ms),
        })
    }

    /// The resolved delivery endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Delivers one payload, retrying transient failures within the
    /// per-recipient budget.
    ///
    /// The budget is intentionally small; a recipient that keeps failing
    /// is dropped so it can never stall the rest of a fan-out batch.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Delivery`] when the provider rejects the
    /// message after all attempts, or [`PushError::Http`] for transport
    /// failures.
    pub async fn send(&self, bearer: &str, payload: &PushPayload) -> Result<(), PushError> {
        let mut last_error = None;

        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                let delay = self.retry_backoff * (1 << (attempt - 1));
                log::warn!(
                    "Push delivery retry {attempt}/{} for token ending {} in {delay:?}",
                    self.retry_attempts,
                    token_tail(&payload.message.token),
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(bearer, payload).await {
                Ok(()) => return Ok(()),
                Err(err) if is_transient(&err) && attempt < self.retry_attempts => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| PushError::Delivery {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "delivery failed after all retries".to_string(),
        }))
    }

    async fn send_once(&self, bearer: &str, payload: &PushPayload) -> Result<(), PushError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(PushError::Delivery {
            status,
            body: snippet(&body),
        })
    }
}

/// Returns `true` if a failed delivery is worth another attempt.
fn is_transient(err: &PushError) -> bool {
    match err {
        PushError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        PushError::Delivery { status, .. } => {
            status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
        }
        PushError::Credential { .. } | PushError::Registry { .. } => false,
    }
}

/// Truncates a response body for logs and error messages.
fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut cut = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}

/// Last few characters of a token, safe to log.
fn token_tail(token: &str) -> &str {
    let tail_start = token.len().saturating_sub(6);
    token.get(tail_start..).unwrap_or(token)
}
