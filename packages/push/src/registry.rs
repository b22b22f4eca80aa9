//! Compile-time registry of push provider configurations.
//!
//! Each push provider is defined in a TOML file under `providers/`. The
//! registry embeds these at compile time; deployment-specific values (the
//! delivery endpoint, the service account key path) can be overridden
//! through environment variables without rebuilding.

use serde::Deserialize;

/// A push provider configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct PushProviderConfig {
    /// Unique identifier (e.g., `"fcm"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this provider is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delivery endpoint and dispatch tuning.
    pub delivery: DeliveryConfig,
    /// Android notification appearance defaults.
    pub android: AndroidConfig,
    /// OAuth2 token exchange settings.
    pub auth: AuthConfig,
}

/// Delivery endpoint and dispatch tuning for a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Endpoint URL template; `{project_id}` is substituted at startup.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum concurrent dispatches during a fan-out pass.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Retry budget per recipient on transient delivery failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base backoff between retries in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Android notification appearance defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AndroidConfig {
    /// Notification icon resource name.
    pub icon: String,
    /// Accent color as a hex string.
    pub color: String,
    /// Notification sound name.
    pub sound: String,
    /// Android notification channel ID.
    pub channel_id: String,
}

/// OAuth2 token exchange settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token endpoint for the JWT-bearer exchange.
    pub token_uri: String,
    /// OAuth2 scope requested for delivery.
    pub scope: String,
    /// Per-request timeout for the token exchange in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    20
}

const fn default_max_in_flight() -> usize {
    16
}

const fn default_retry_attempts() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    250
}

impl DeliveryConfig {
    /// Resolves the delivery endpoint for a project.
    ///
    /// A `PUSH_ENDPOINT` environment variable wins over the embedded
    /// template, which is how tests and staging point at a fake provider.
    #[must_use]
    pub fn endpoint_for_project(&self, project_id: &str) -> String {
        std::env::var("PUSH_ENDPOINT")
            .unwrap_or_else(|_| self.endpoint.replace("{project_id}", project_id))
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const FCM_TOML: &str = include_str!("../providers/fcm.toml");

/// Returns the Firebase Cloud Messaging provider configuration.
///
/// # Panics
///
/// Panics if the embedded TOML config is malformed (this is a
/// compile-time guarantee since the config is embedded).
#[must_use]
pub fn fcm_provider() -> PushProviderConfig {
    toml::de::from_str(FCM_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse push provider 'fcm': {e}"))
}
