#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Moderation workflow for report clusters.
//!
//! Each cluster moves from pending to exactly one terminal state:
//! accepted (one [`PublishedAlert`] created, members deleted) or rejected
//! (members deleted, nothing created). [`ModerationWorkflow::accept`] and
//! [`ModerationWorkflow::reject`] consume the cluster by value, so a
//! handled cluster cannot be resubmitted.
//!
//! Member deletes run concurrently and the outcome waits for all of them.
//! A member already deleted by another operator counts as success; a
//! delete that errors is reported in the outcome and logged, but never
//! fails the operation — the cluster is considered handled either way.

use std::sync::Arc;

use blockwatch_alert_models::{PublishedAlert, RawReport};
use blockwatch_cluster::{AlertCluster, DEDUP_RADIUS_KM, cluster_reports};
use blockwatch_geo::parse_location;
use blockwatch_store::{ReportStore, StoreError};
use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

/// Errors from moderation operations.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// A cluster with no members cannot be moderated.
    #[error("cluster has no members")]
    EmptyCluster,

    /// A decision referenced reports none of which are still pending;
    /// the queue it was made from is stale.
    #[error("no requested report is still pending")]
    NothingPending,

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of accepting a cluster.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    /// The alert that was published.
    pub alert: PublishedAlert,
    /// Members whose reports were removed (or were already gone).
    pub deleted: usize,
    /// Members whose delete errored; their reports remain in storage.
    pub failed_deletes: Vec<Uuid>,
}

/// Result of rejecting a cluster.
#[derive(Debug, Clone)]
pub struct RejectOutcome {
    /// Members whose reports were removed (or were already gone).
    pub deleted: usize,
    /// Members whose delete errored; their reports remain in storage.
    pub failed_deletes: Vec<Uuid>,
}

/// The moderation workflow over an injected report store.
pub struct ModerationWorkflow {
    store: Arc<dyn ReportStore>,
    dedup_radius_km: f64,
}

impl ModerationWorkflow {
    /// Creates a workflow with the default dedup radius.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self::with_radius(store, DEDUP_RADIUS_KM)
    }

    /// Creates a workflow with a custom dedup radius.
    #[must_use]
    pub const fn with_radius(store: Arc<dyn ReportStore>, dedup_radius_km: f64) -> Self {
        Self {
            store,
            dedup_radius_km,
        }
    }

    /// Materializes the moderation queue from the live pending list.
    ///
    /// The queue is transient: every call re-reads pending reports and
    /// re-clusters them, so reports handled elsewhere simply drop out.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::Store`] if the pending read fails.
    pub async fn load_queue(&self) -> Result<Vec<AlertCluster>, ModerationError> {
        let pending = self.store.list_pending().await?;
        Ok(cluster_reports(pending, self.dedup_radius_km))
    }

    /// Rebuilds the cluster for a decision made over a previously loaded
    /// queue.
    ///
    /// Reports handled since that load drop out; reports that arrived
    /// since are not pulled in and stay pending for the next review.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::NothingPending`] when none of the
    /// requested reports are still pending, and [`ModerationError::Store`]
    /// if the pending read fails.
    pub async fn materialize(&self, report_ids: &[Uuid]) -> Result<AlertCluster, ModerationError> {
        let pending = self.store.list_pending().await?;
        let members: Vec<RawReport> = pending
            .into_iter()
            .filter(|report| report_ids.contains(&report.id))
            .collect();

        AlertCluster::from_members(members).ok_or(ModerationError::NothingPending)
    }

    /// Accepts a cluster: publishes one alert, then deletes the member
    /// reports.
    ///
    /// The alert takes its type, severity, location, image, and submitter
    /// from the cluster's first member. The location is normalized to the
    /// canonical `"lat,lon"` form when it parses; otherwise the raw text
    /// is kept. For a single-member cluster the description passes
    /// through unchanged; otherwise it is synthesized from the member
    /// count, the incident type, and the first member's description.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::EmptyCluster`] for an empty cluster and
    /// [`ModerationError::Store`] if alert creation fails. Member delete
    /// failures do not error; see [`AcceptOutcome::failed_deletes`].
    pub async fn accept(&self, cluster: AlertCluster) -> Result<AcceptOutcome, ModerationError> {
        let seed = cluster.members.first().ok_or(ModerationError::EmptyCluster)?;

        let location = parse_location(&seed.location)
            .map_or_else(|_| seed.location.clone(), |coord| coord.to_string());

        let alert = PublishedAlert {
            id: Uuid::new_v4(),
            incident_type: seed.incident_type,
            severity: seed.severity,
            location,
            description: synthesize_description(&cluster.members),
            image_ref: seed.image_ref.clone(),
            submitter_id: seed.submitter_id.clone(),
            created_at: Utc::now(),
        };

        let alert_id = self.store.create_alert(alert.clone()).await?;
        log::info!(
            "Published alert {alert_id} from cluster of {} report(s) at {:?}",
            cluster.members.len(),
            cluster.anchor_location,
        );

        let (deleted, failed_deletes) = self.delete_members(&cluster.members).await;

        Ok(AcceptOutcome {
            alert,
            deleted,
            failed_deletes,
        })
    }

    /// Rejects a cluster: deletes the member reports, publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::EmptyCluster`] for an empty cluster.
    /// Member delete failures do not error; see
    /// [`RejectOutcome::failed_deletes`].
    pub async fn reject(&self, cluster: AlertCluster) -> Result<RejectOutcome, ModerationError> {
        if cluster.members.is_empty() {
            return Err(ModerationError::EmptyCluster);
        }

        log::info!(
            "Rejected cluster of {} report(s) at {:?}",
            cluster.members.len(),
            cluster.anchor_location,
        );

        let (deleted, failed_deletes) = self.delete_members(&cluster.members).await;

        Ok(RejectOutcome {
            deleted,
            failed_deletes,
        })
    }

    /// Deletes all member reports concurrently and waits for every
    /// outcome before returning.
    async fn delete_members(&self, members: &[RawReport]) -> (usize, Vec<Uuid>) {
        let results = join_all(
            members
                .iter()
                .map(|member| self.store.delete_report(member.id)),
        )
        .await;

        let mut deleted = 0;
        let mut failed = Vec::new();
        for (member, result) in members.iter().zip(results) {
            match result {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    // Another operator got there first; still a success.
                    log::info!("Report {} was already removed", member.id);
                    deleted += 1;
                }
                Err(e) => {
                    log::error!("Failed to delete report {}: {e}", member.id);
                    failed.push(member.id);
                }
            }
        }

        (deleted, failed)
    }
}

/// Builds the published description for a cluster.
fn synthesize_description(members: &[RawReport]) -> String {
    match members {
        [only] => only.description.clone(),
        [first, ..] => format!(
            "Multiple reports ({}) of {} in the area. {}",
            members.len(),
            first.incident_type.label().to_lowercase(),
            first.description,
        ),
        [] => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockwatch_alert_models::{IncidentSeverity, IncidentType};
    use blockwatch_store::memory::MemoryReportStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(incident_type: IncidentType, location: &str, description: &str) -> RawReport {
        RawReport {
            id: Uuid::new_v4(),
            incident_type,
            severity: IncidentSeverity::High,
            location: location.to_string(),
            description: description.to_string(),
            image_ref: Some("img/1.jpg".to_string()),
            submitter_id: "user-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn cluster_of(members: Vec<RawReport>) -> AlertCluster {
        let anchor_location = members
            .first()
            .map(|m| m.location.clone())
            .unwrap_or_default();
        AlertCluster {
            members,
            anchor_location,
        }
    }

    /// Store that counts calls and can be told to fail or miss deletes.
    #[derive(Default)]
    struct CountingStore {
        alerts_created: AtomicUsize,
        deletes_attempted: AtomicUsize,
        fail_delete_ids: Vec<Uuid>,
        missing_ids: Vec<Uuid>,
    }

    #[async_trait]
    impl ReportStore for CountingStore {
        async fn create_report(&self, report: RawReport) -> Result<Uuid, StoreError> {
            Ok(report.id)
        }

        async fn create_alert(&self, alert: PublishedAlert) -> Result<Uuid, StoreError> {
            self.alerts_created.fetch_add(1, Ordering::SeqCst);
            Ok(alert.id)
        }

        async fn list_pending(&self) -> Result<Vec<RawReport>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError> {
            self.deletes_attempted.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete_ids.contains(&id) {
                return Err(StoreError::Backend {
                    message: "simulated delete failure".to_string(),
                });
            }
            Ok(!self.missing_ids.contains(&id))
        }
    }

    #[tokio::test]
    async fn accept_creates_one_alert_and_deletes_every_member() {
        let members = vec![
            report(IncidentType::Fire, "37.7749, -122.4194", "smoke visible"),
            report(IncidentType::Fire, "37.7750, -122.4195", "flames on roof"),
            report(IncidentType::Fire, "37.7751, -122.4196", "fire trucks arriving"),
        ];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(store.alerts_created.load(Ordering::SeqCst), 1);
        assert_eq!(store.deletes_attempted.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.deleted, 3);
        assert!(outcome.failed_deletes.is_empty());
    }

    #[tokio::test]
    async fn accept_synthesizes_multi_member_description() {
        let members = vec![
            report(IncidentType::PowerOutage, "37.7749, -122.4194", "lights out on 5th"),
            report(IncidentType::PowerOutage, "37.7750, -122.4195", "whole block dark"),
        ];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(
            outcome.alert.description,
            "Multiple reports (2) of power outage in the area. lights out on 5th"
        );
    }

    #[tokio::test]
    async fn accept_passes_singleton_description_through() {
        let members = vec![report(
            IncidentType::Accident,
            "37.7749, -122.4194",
            "two cars, no injuries",
        )];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(outcome.alert.description, "two cars, no injuries");
    }

    #[tokio::test]
    async fn accept_copies_first_member_fields() {
        let first = report(IncidentType::Flood, "12.3456, 65.4321", "street flooding");
        let submitter = first.submitter_id.clone();
        let members = vec![
            first,
            report(IncidentType::Fire, "12.3457, 65.4322", "unrelated"),
        ];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(outcome.alert.incident_type, IncidentType::Flood);
        assert_eq!(outcome.alert.location, "12.345600,65.432100");
        assert_eq!(outcome.alert.image_ref.as_deref(), Some("img/1.jpg"));
        assert_eq!(outcome.alert.submitter_id, submitter);
    }

    #[tokio::test]
    async fn accept_normalizes_a_parsable_anchor_location() {
        let members = vec![report(
            IncidentType::Fire,
            "37.7749, -122.4194",
            "smoke visible",
        )];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store);

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(outcome.alert.location, "37.774900,-122.419400");
    }

    #[tokio::test]
    async fn accept_keeps_raw_text_when_anchor_does_not_parse() {
        let members = vec![report(
            IncidentType::Other,
            "behind the old mill",
            "strange noises",
        )];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store);

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(outcome.alert.location, "behind the old mill");
    }

    #[tokio::test]
    async fn delete_failures_are_non_fatal() {
        let members = vec![
            report(IncidentType::Crime, "37.7749, -122.4194", "break-in"),
            report(IncidentType::Crime, "37.7750, -122.4195", "same break-in"),
            report(IncidentType::Crime, "37.7751, -122.4196", "saw it too"),
        ];
        let failing = members[1].id;
        let store = Arc::new(CountingStore {
            fail_delete_ids: vec![failing],
            ..CountingStore::default()
        });
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.accept(cluster_of(members)).await.unwrap();

        assert_eq!(store.alerts_created.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failed_deletes, vec![failing]);
    }

    #[tokio::test]
    async fn already_removed_member_counts_as_deleted() {
        let members = vec![
            report(IncidentType::Crime, "37.7749, -122.4194", "break-in"),
            report(IncidentType::Crime, "37.7750, -122.4195", "same break-in"),
        ];
        let missing = members[1].id;
        let store = Arc::new(CountingStore {
            missing_ids: vec![missing],
            ..CountingStore::default()
        });
        let workflow = ModerationWorkflow::new(store.clone());

        let outcome = workflow.reject(cluster_of(members)).await.unwrap();

        assert_eq!(outcome.deleted, 2);
        assert!(outcome.failed_deletes.is_empty());
    }

    #[tokio::test]
    async fn reject_creates_no_alert() {
        let members = vec![report(IncidentType::Other, "nowhere in particular", "spam")];
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store.clone());

        workflow.reject(cluster_of(members)).await.unwrap();

        assert_eq!(store.alerts_created.load(Ordering::SeqCst), 0);
        assert_eq!(store.deletes_attempted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_cluster_is_rejected_outright() {
        let store = Arc::new(CountingStore::default());
        let workflow = ModerationWorkflow::new(store);

        let result = workflow.accept(cluster_of(Vec::new())).await;

        assert!(matches!(result, Err(ModerationError::EmptyCluster)));
    }

    #[tokio::test]
    async fn materialize_drops_reports_handled_since_the_queue_was_loaded() {
        let store = Arc::new(MemoryReportStore::new());
        let a = report(IncidentType::Fire, "37.7749, -122.4194", "smoke");
        let b = report(IncidentType::Fire, "37.7750, -122.4195", "more smoke");
        let ids = vec![a.id, b.id];
        store.create_report(a).await.unwrap();
        store.create_report(b).await.unwrap();
        store.delete_report(ids[1]).await.unwrap();
        let workflow = ModerationWorkflow::new(store);

        let cluster = workflow.materialize(&ids).await.unwrap();

        assert_eq!(cluster.size(), 1);
        assert_eq!(cluster.members[0].id, ids[0]);
    }

    #[tokio::test]
    async fn materialize_leaves_unrequested_reports_pending() {
        let store = Arc::new(MemoryReportStore::new());
        let a = report(IncidentType::Fire, "37.7749, -122.4194", "smoke");
        let b = report(IncidentType::Fire, "37.7750, -122.4195", "more smoke");
        let late = report(IncidentType::Fire, "37.7751, -122.4196", "arrived after review");
        let ids = vec![a.id, b.id];
        store.create_report(a).await.unwrap();
        store.create_report(b).await.unwrap();
        store.create_report(late).await.unwrap();
        let workflow = ModerationWorkflow::new(store);

        let cluster = workflow.materialize(&ids).await.unwrap();

        assert_eq!(cluster.size(), 2);
    }

    #[tokio::test]
    async fn materialize_with_no_surviving_members_is_stale() {
        let store = Arc::new(MemoryReportStore::new());
        let workflow = ModerationWorkflow::new(store);

        let result = workflow.materialize(&[Uuid::new_v4()]).await;

        assert!(matches!(result, Err(ModerationError::NothingPending)));
    }

    #[tokio::test]
    async fn load_queue_clusters_live_pending_reports() {
        let store = Arc::new(MemoryReportStore::new());
        store
            .create_report(report(IncidentType::Fire, "37.7749, -122.4194", "smoke"))
            .await
            .unwrap();
        store
            .create_report(report(IncidentType::Fire, "37.7755, -122.4190", "more smoke"))
            .await
            .unwrap();
        store
            .create_report(report(IncidentType::Flood, "52.5200, 13.4050", "water rising"))
            .await
            .unwrap();
        let workflow = ModerationWorkflow::new(store);

        let queue = workflow.load_queue().await.unwrap();

        assert_eq!(queue.len(), 2);
        let sizes: Vec<_> = queue.iter().map(AlertCluster::size).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }
}
