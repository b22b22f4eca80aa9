#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Distance-filtered concurrent notification fan-out.
//!
//! [`NotificationFanout::notify_nearby`] takes a freshly published alert,
//! finds every subscriber with a usable push token and a known location
//! within the notify radius, and dispatches one push payload per
//! subscriber with bounded concurrency. One recipient failing never
//! blocks or fails the others; the pass reports how many subscribers were
//! scanned, how many were in range, and how many dispatches succeeded.
//!
//! Also home to the push-token conflict handling in [`registration`],
//! which runs at registration time, not during fan-out.

pub mod registration;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blockwatch_alert_models::{PublishedAlert, Subscriber};
use blockwatch_geo::{CoordinateError, NormalizedCoordinate, distance_km, parse_location};
use blockwatch_push::credentials::CredentialProvider;
use blockwatch_push::payload::{AndroidBlock, Notification, PushPayload};
use blockwatch_push::registry::PushProviderConfig;
use blockwatch_push::{PushClient, PushError};
use blockwatch_store::{StoreError, SubscriberStore};

/// Radius within which subscribers are notified of a published alert.
pub const NOTIFY_RADIUS_KM: f64 = 10.0;

/// Errors that abort a fan-out pass before any dispatch.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// The alert's own location could not be parsed, so no distance can
    /// be computed for anyone.
    #[error("alert location unusable: {0}")]
    AlertLocation(#[from] CoordinateError),

    /// No valid push credential could be obtained.
    #[error("credential error: {message}")]
    Credential {
        /// Description of the credential failure.
        message: String,
    },

    /// The subscriber bulk-read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Counts reported by one fan-out pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutSummary {
    /// Subscribers read from the store.
    pub scanned: usize,
    /// Subscribers with a usable token and location within the radius.
    pub in_range: usize,
    /// Dispatches that the provider accepted. Failures are logged and
    /// show up as `dispatched < in_range`.
    pub dispatched: usize,
}

/// One dispatch attempt for one eligible subscriber.
#[derive(Debug, Clone)]
pub struct NotificationTask {
    /// Subscriber being notified.
    pub subscriber_id: String,
    /// Device token to address.
    pub push_token: String,
    /// Distance from the alert in kilometers.
    pub distance_km: f64,
}

/// Delivery seam used by the fan-out.
///
/// [`PushClient`] is the production implementation; tests substitute
/// counting stubs.
#[async_trait]
pub trait AlertDelivery: Send + Sync {
    /// Delivers one payload to one recipient.
    ///
    /// # Errors
    ///
    /// Returns [`PushError`] if the provider rejects the message or the
    /// transport fails.
    async fn deliver(&self, bearer: &str, payload: &PushPayload) -> Result<(), PushError>;
}

#[async_trait]
impl AlertDelivery for PushClient {
    async fn deliver(&self, bearer: &str, payload: &PushPayload) -> Result<(), PushError> {
        self.send(bearer, payload).await
    }
}

/// The fan-out engine over injected collaborators.
pub struct NotificationFanout {
    subscribers: Arc<dyn SubscriberStore>,
    credentials: Arc<CredentialProvider>,
    delivery: Arc<dyn AlertDelivery>,
    android: AndroidBlock,
    radius_km: f64,
    max_in_flight: usize,
    deadline: Option<Duration>,
}

impl NotificationFanout {
    /// Creates a fan-out engine with the provider's dispatch tuning and
    /// the default notify radius.
    #[must_use]
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        credentials: Arc<CredentialProvider>,
        delivery: Arc<dyn AlertDelivery>,
        provider: &PushProviderConfig,
    ) -> Self {
        Self {
            subscribers,
            credentials,
            delivery,
            android: AndroidBlock::from_config(&provider.android),
            radius_km: NOTIFY_RADIUS_KM,
            max_in_flight: provider.delivery.max_in_flight,
            deadline: None,
        }
    }

    /// Overrides the notify radius.
    #[must_use]
    pub const fn with_radius(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    /// Sets an overall deadline for a pass. When the deadline passes,
    /// the pass returns with the counts accumulated so far; remaining
    /// dispatches are detached to finish unobserved, not cancelled.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Notifies every subscriber within the radius of the alert.
    ///
    /// The credential and the subscriber bulk-read complete before any
    /// dispatch starts; per-recipient delivery failures are logged and
    /// counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::AlertLocation`] when the alert's location
    /// doesn't parse, [`FanoutError::Credential`] when no bearer token
    /// could be obtained, and [`FanoutError::Store`] when the subscriber
    /// read fails.
    pub async fn notify_nearby(
        &self,
        alert: &PublishedAlert,
    ) -> Result<FanoutSummary, FanoutError> {
        use futures::stream::{self, StreamExt as _};

        let alert_coord = parse_location(&alert.location)?;

        let bearer =
            self.credentials
                .bearer_token()
                .await
                .map_err(|e| FanoutError::Credential {
                    message: e.to_string(),
                })?;

        let subscribers = self.subscribers.list_all().await?;
        let scanned = subscribers.len();

        let tasks = eligible_tasks(alert_coord, subscribers, self.radius_km);
        let in_range = tasks.len();

        log::info!(
            "Fan-out for alert {}: {scanned} subscriber(s) scanned, {in_range} in range",
            alert.id,
        );

        let mut dispatched = 0_usize;
        {
            // Each dispatch owns its payload, bearer, and delivery handle
            // so it can outlive the pass when a deadline detaches it.
            let dispatches: Vec<_> = tasks
                .into_iter()
                .map(|task| {
                    let payload = build_payload(alert, &task, &self.android);
                    let delivery = Arc::clone(&self.delivery);
                    let bearer = bearer.clone();
                    async move {
                        match delivery.deliver(&bearer, &payload).await {
                            Ok(()) => true,
                            Err(e) => {
                                log::warn!("Push to subscriber {} failed: {e}", task.subscriber_id);
                                false
                            }
                        }
                    }
                })
                .collect();

            let mut outcomes = stream::iter(dispatches).buffer_unordered(self.max_in_flight);

            match self.deadline {
                Some(limit) => {
                    let deadline = tokio::time::Instant::now() + limit;
                    loop {
                        match tokio::time::timeout_at(deadline, outcomes.next()).await {
                            Ok(Some(true)) => dispatched += 1,
                            Ok(Some(false)) => {}
                            Ok(None) => break,
                            Err(_) => {
                                log::warn!(
                                    "Fan-out for alert {} hit its {limit:?} deadline, \
                                     leaving remaining dispatches to finish unobserved",
                                    alert.id,
                                );
                                tokio::spawn(async move {
                                    while outcomes.next().await.is_some() {}
                                });
                                break;
                            }
                        }
                    }
                }
                None => {
                    while let Some(delivered) = outcomes.next().await {
                        if delivered {
                            dispatched += 1;
                        }
                    }
                }
            }
        }

        if dispatched < in_range {
            log::warn!(
                "Fan-out for alert {}: {} of {in_range} dispatches did not complete",
                alert.id,
                in_range - dispatched,
            );
        }

        Ok(FanoutSummary {
            scanned,
            in_range,
            dispatched,
        })
    }
}

/// Selects the subscribers that should receive this alert.
///
/// Skips subscribers with an empty or missing token, with no stored
/// location, or with a stored location outside valid coordinate ranges.
/// Inclusion at exactly the radius boundary counts as in range.
fn eligible_tasks(
    alert_coord: NormalizedCoordinate,
    subscribers: Vec<Subscriber>,
    radius_km: f64,
) -> Vec<NotificationTask> {
    subscribers
        .into_iter()
        .filter_map(|subscriber| {
            let token = subscriber.push_token.filter(|t| !t.is_empty())?;
            let (latitude, longitude) = subscriber.latitude.zip(subscriber.longitude)?;
            let coord = NormalizedCoordinate::new(latitude, longitude).ok()?;
            let distance = distance_km(alert_coord, coord);
            (distance <= radius_km).then(|| NotificationTask {
                subscriber_id: subscriber.user_id,
                push_token: token,
                distance_km: distance,
            })
        })
        .collect()
}

/// Builds the push payload for one recipient.
fn build_payload(
    alert: &PublishedAlert,
    task: &NotificationTask,
    android: &AndroidBlock,
) -> PushPayload {
    let mut data = BTreeMap::new();
    data.insert("alert_type".to_string(), alert.incident_type.to_string());
    data.insert("location".to_string(), alert.location.clone());
    data.insert("severity".to_string(), alert.severity.to_string());
    data.insert("distance".to_string(), format!("{:.1}", task.distance_km));
    data.insert("description".to_string(), alert.description.clone());

    PushPayload::new(
        task.push_token.clone(),
        Notification {
            title: format!(
                "{} reported {:.1} km away",
                alert.incident_type.label(),
                task.distance_km,
            ),
            body: format!(
                "{} severity near {}. {}",
                alert.severity.label(),
                alert.location,
                alert.description,
            ),
        },
        data,
        android.clone(),
    )
}
