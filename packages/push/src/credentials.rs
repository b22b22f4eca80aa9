//! Service account credentials and the cached bearer token.
//!
//! Push delivery authenticates with a short-lived OAuth2 access token
//! obtained through the two-legged JWT-bearer exchange: sign an assertion
//! with the service account's RSA key, trade it at the token endpoint for
//! a bearer token, and reuse that token until shortly before it expires.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::PushError;
use crate::registry::AuthConfig;

/// Refresh tokens this many seconds before they actually expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Requested lifetime of the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a Google-style service account key file that the
/// exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Cloud project the key belongs to.
    pub project_id: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Service account email, used as the JWT issuer.
    pub client_email: String,
    /// Token endpoint from the key file, when present.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses a service account key from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Credential`] if the JSON is malformed or
    /// missing required fields.
    pub fn from_json(json: &str) -> Result<Self, PushError> {
        serde_json::from_str(json).map_err(|e| PushError::Credential {
            message: format!("invalid service account key: {e}"),
        })
    }

    /// Reads and parses a service account key file.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Credential`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Self, PushError> {
        let json = std::fs::read_to_string(path).map_err(|e| PushError::Credential {
            message: format!("failed to read service account key {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }
}

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token value.
    pub token: String,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Source of fresh access tokens.
///
/// The production implementation is [`ServiceAccountTokenSource`]; tests
/// substitute counting stubs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetches a brand-new access token.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Credential`] if the exchange fails.
    async fn fetch_token(&self) -> Result<AccessToken, PushError>;
}

/// JWT-bearer assertion claims.
#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Token endpoint response body.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// [`TokenSource`] that performs the two-legged OAuth2 exchange with a
/// service account key.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    token_uri: String,
    scope: String,
    client: reqwest::Client,
}

impl ServiceAccountTokenSource {
    /// Creates a token source for the given key and registry auth
    /// settings.
    ///
    /// The key file's own `token_uri` wins over the registry's.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Http`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(key: ServiceAccountKey, auth: &AuthConfig) -> Result<Self, PushError> {
        let token_uri = key
            .token_uri
            .clone()
            .unwrap_or_else(|| auth.token_uri.clone());
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(auth.timeout_secs))
            .build()?;
        Ok(Self {
            key,
            token_uri,
            scope: auth.scope.clone(),
            client,
        })
    }

    /// Project ID of the underlying service account.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    fn signed_assertion(&self) -> Result<String, PushError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key =
            EncodingKey::from_rsa_pem(self.key.private_key.as_bytes()).map_err(|e| {
                PushError::Credential {
                    message: format!("invalid service account private key: {e}"),
                }
            })?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key).map_err(
            |e| PushError::Credential {
                message: format!("failed to sign token assertion: {e}"),
            },
        )
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, PushError> {
        let assertion = self.signed_assertion()?;

        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Credential {
                message: format!("token exchange returned {status}: {body}"),
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| PushError::Credential {
            message: format!("token exchange response malformed: {e}"),
        })?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

/// Owns the cached push credential and refreshes it before expiry.
///
/// Callers ask for a valid bearer token; they never see the cache. The
/// cache lock is never held across the token exchange itself, so a slow
/// or hung endpoint never wedges other callers; concurrent refreshes may
/// each run an exchange and the last write wins.
pub struct CredentialProvider {
    source: Box<dyn TokenSource>,
    cached: Mutex<Option<AccessToken>>,
}

impl CredentialProvider {
    /// Creates a provider around the given token source.
    #[must_use]
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token valid for at least the expiry skew.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Credential`] if a refresh was needed and the
    /// exchange failed.
    pub async fn bearer_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.cached.lock().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.token.clone());
            }
        }

        // Fetch with the lock released; a duplicate exchange from a
        // concurrent caller is acceptable, last write wins.
        log::info!("Push credential missing or near expiry, refreshing");
        let token = self.source.fetch_token().await?;
        let bearer = token.token.clone();
        *self.cached.lock().await = Some(token);
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        lifetime_secs: i64,
    }

    impl CountingSource {
        const fn with_lifetime(lifetime_secs: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetime_secs,
            }
        }
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch_token(&self) -> Result<AccessToken, PushError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                token: format!("token-{call}"),
                expires_at: Utc::now() + Duration::seconds(self.lifetime_secs),
            })
        }
    }

    #[tokio::test]
    async fn reuses_fresh_token() {
        let provider = CredentialProvider::new(Box::new(CountingSource::with_lifetime(3600)));

        let first = provider.bearer_token().await.unwrap();
        let second = provider.bearer_token().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-1");
    }

    #[tokio::test]
    async fn refreshes_token_within_expiry_skew() {
        // Lifetime under the 60 s skew, so every call looks near-expired.
        let provider = CredentialProvider::new(Box::new(CountingSource::with_lifetime(30)));

        let first = provider.bearer_token().await.unwrap();
        let second = provider.bearer_token().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-2");
    }

    #[tokio::test]
    async fn rejects_malformed_key_json() {
        let result = ServiceAccountKey::from_json("{\"project_id\": 42}");
        assert!(matches!(result, Err(PushError::Credential { .. })));
    }

    #[test]
    fn key_prefers_its_own_token_uri() {
        let key = ServiceAccountKey {
            project_id: "demo".to_string(),
            private_key: "not a real key".to_string(),
            client_email: "svc@demo.iam.gserviceaccount.com".to_string(),
            token_uri: Some("https://example.com/token".to_string()),
        };
        let auth = AuthConfig {
            token_uri: "https://fallback.example.com/token".to_string(),
            scope: "scope".to_string(),
            timeout_secs: 10,
        };

        let source = ServiceAccountTokenSource::new(key, &auth).unwrap();

        assert_eq!(source.token_uri, "https://example.com/token");
    }

    /// Source whose first fetch never resolves; later fetches succeed.
    struct StallFirstSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for StallFirstSource {
        async fn fetch_token(&self) -> Result<AccessToken, PushError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(AccessToken {
                token: "token-late".to_string(),
                expires_at: Utc::now() + Duration::seconds(3600),
            })
        }
    }

    #[tokio::test]
    async fn hung_exchange_does_not_block_other_callers() {
        let provider = std::sync::Arc::new(CredentialProvider::new(Box::new(StallFirstSource {
            calls: AtomicUsize::new(0),
        })));

        let stalled = {
            let provider = std::sync::Arc::clone(&provider);
            tokio::spawn(async move { provider.bearer_token().await })
        };
        tokio::task::yield_now().await;

        let second = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            provider.bearer_token(),
        )
        .await
        .expect("second caller must not wait on the stalled exchange")
        .unwrap();

        assert_eq!(second, "token-late");
        stalled.abort();
    }
}
