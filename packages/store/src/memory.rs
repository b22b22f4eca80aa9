//! In-memory store implementations.
//!
//! Backed by `BTreeMap`s behind `std::sync::RwLock`; no lock is ever held
//! across an await point. Suitable for the demo server and tests, not for
//! durable deployments.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use blockwatch_alert_models::{PublishedAlert, RawReport, Subscriber, SubscriberUpdate};
use uuid::Uuid;

use crate::{ReportStore, StoreError, SubscriberStore};

/// In-memory [`ReportStore`].
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<BTreeMap<Uuid, RawReport>>,
    alerts: RwLock<BTreeMap<Uuid, PublishedAlert>>,
}

impl MemoryReportStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all published alerts, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the alerts lock is poisoned.
    #[must_use]
    pub fn published_alerts(&self) -> Vec<PublishedAlert> {
        let alerts = self.alerts.read().expect("alerts lock poisoned");
        let mut all: Vec<_> = alerts.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Number of pending reports currently stored.
    ///
    /// # Panics
    ///
    /// Panics if the reports lock is poisoned.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.reports.read().expect("reports lock poisoned").len()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create_report(&self, report: RawReport) -> Result<Uuid, StoreError> {
        let id = report.id;
        let mut reports = self.reports.write().expect("reports lock poisoned");
        reports.insert(id, report);
        Ok(id)
    }

    async fn create_alert(&self, alert: PublishedAlert) -> Result<Uuid, StoreError> {
        let id = alert.id;
        let mut alerts = self.alerts.write().expect("alerts lock poisoned");
        alerts.insert(id, alert);
        Ok(id)
    }

    async fn list_pending(&self) -> Result<Vec<RawReport>, StoreError> {
        let reports = self.reports.read().expect("reports lock poisoned");
        let mut pending: Vec<_> = reports.values().cloned().collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut reports = self.reports.write().expect("reports lock poisoned");
        Ok(reports.remove(&id).is_some())
    }
}

/// In-memory [`SubscriberStore`].
#[derive(Debug, Default)]
pub struct MemorySubscriberStore {
    subscribers: RwLock<BTreeMap<String, Subscriber>>,
}

impl MemorySubscriberStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given subscribers.
    #[must_use]
    pub fn with_subscribers(subscribers: Vec<Subscriber>) -> Self {
        let map = subscribers
            .into_iter()
            .map(|s| (s.user_id.clone(), s))
            .collect();
        Self {
            subscribers: RwLock::new(map),
        }
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn list_all(&self) -> Result<Vec<Subscriber>, StoreError> {
        let subscribers = self.subscribers.read().expect("subscribers lock poisoned");
        Ok(subscribers.values().cloned().collect())
    }

    async fn find_by_push_token(&self, token: &str) -> Result<Option<Subscriber>, StoreError> {
        let subscribers = self.subscribers.read().expect("subscribers lock poisoned");
        Ok(subscribers
            .values()
            .find(|s| s.push_token.as_deref() == Some(token))
            .cloned())
    }

    async fn update(&self, user_id: &str, update: SubscriberUpdate) -> Result<(), StoreError> {
        let mut subscribers = self.subscribers.write().expect("subscribers lock poisoned");
        match subscribers.get_mut(user_id) {
            Some(subscriber) => {
                update.apply_to(subscriber);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                id: user_id.to_string(),
            }),
        }
    }

    async fn merge(&self, user_id: &str, update: SubscriberUpdate) -> Result<(), StoreError> {
        let mut subscribers = self.subscribers.write().expect("subscribers lock poisoned");
        let subscriber = subscribers
            .entry(user_id.to_string())
            .or_insert_with(|| Subscriber::new(user_id.to_string()));
        update.apply_to(subscriber);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwatch_alert_models::{IncidentSeverity, IncidentType};
    use chrono::{Duration, Utc};

    fn report(created_offset_secs: i64) -> RawReport {
        RawReport {
            id: Uuid::new_v4(),
            incident_type: IncidentType::Crime,
            severity: IncidentSeverity::Moderate,
            location: "37.7749, -122.4194".to_string(),
            description: "suspicious activity".to_string(),
            image_ref: None,
            submitter_id: "user-1".to_string(),
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
        }
    }

    #[tokio::test]
    async fn list_pending_is_newest_first() {
        let store = MemoryReportStore::new();
        let older = report(-60);
        let newer = report(0);
        let older_id = older.id;
        let newer_id = newer.id;
        store.create_report(older).await.unwrap();
        store.create_report(newer).await.unwrap();

        let pending = store.list_pending().await.unwrap();

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, newer_id);
        assert_eq!(pending[1].id, older_id);
    }

    #[tokio::test]
    async fn delete_reports_whether_present() {
        let store = MemoryReportStore::new();
        let r = report(0);
        let id = r.id;
        store.create_report(r).await.unwrap();

        assert!(store.delete_report(id).await.unwrap());
        assert!(!store.delete_report(id).await.unwrap());
    }

    #[tokio::test]
    async fn update_missing_subscriber_is_not_found() {
        let store = MemorySubscriberStore::new();

        let result = store
            .update("ghost", SubscriberUpdate::location(37.0, -122.0))
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn merge_creates_missing_subscriber() {
        let store = MemorySubscriberStore::new();

        store
            .merge("user-9", SubscriberUpdate::token("tok-9".to_string()))
            .await
            .unwrap();

        let found = store.find_by_push_token("tok-9").await.unwrap();
        assert_eq!(found.map(|s| s.user_id), Some("user-9".to_string()));
    }

    #[tokio::test]
    async fn find_by_push_token_misses_cleared_tokens() {
        let subscriber = Subscriber::new("user-1".to_string());
        let store = MemorySubscriberStore::with_subscribers(vec![subscriber]);

        let found = store.find_by_push_token("tok-1").await.unwrap();

        assert!(found.is_none());
    }
}
