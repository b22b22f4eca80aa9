#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the blockwatch server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the internal report and alert types to allow independent
//! evolution of the API contract.

use blockwatch_alert_models::{IncidentSeverity, IncidentType, RawReport};
use blockwatch_cluster::AlertCluster;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/reports`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    /// What kind of incident is being reported.
    pub incident_type: IncidentType,
    /// Severity value (1-4). Defaults to the incident type's severity
    /// when omitted.
    pub severity: Option<u8>,
    /// Free-form location text: a coordinate pair, a maps URL, or a
    /// description of the place.
    pub location: String,
    /// What the reporter saw.
    pub description: String,
    /// Optional reference to an uploaded photo.
    pub image_ref: Option<String>,
    /// Reporting user.
    pub submitter_id: String,
}

/// Response of `POST /api/reports`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportResponse {
    /// ID assigned to the stored report.
    pub id: Uuid,
}

/// A pending report as returned by the moderation queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Report ID.
    pub id: Uuid,
    /// Incident type.
    pub incident_type: IncidentType,
    /// Severity level name.
    pub severity: IncidentSeverity,
    /// Severity numeric value (1-4).
    pub severity_value: u8,
    /// Raw location text as submitted.
    pub location: String,
    /// Reporter's description.
    pub description: String,
    /// Optional reference to an uploaded photo.
    pub image_ref: Option<String>,
    /// Reporting user.
    pub submitter_id: String,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl From<RawReport> for ApiReport {
    fn from(report: RawReport) -> Self {
        Self {
            id: report.id,
            incident_type: report.incident_type,
            severity: report.severity,
            severity_value: report.severity.value(),
            location: report.location,
            description: report.description,
            image_ref: report.image_ref,
            submitter_id: report.submitter_id,
            created_at: report.created_at,
        }
    }
}

/// One duplicate group in the moderation queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCluster {
    /// Raw location text of the cluster's seed report.
    pub anchor_location: String,
    /// Number of reports in the cluster.
    pub size: usize,
    /// The clustered reports, seed first.
    pub members: Vec<ApiReport>,
}

impl From<AlertCluster> for ApiCluster {
    fn from(cluster: AlertCluster) -> Self {
        Self {
            anchor_location: cluster.anchor_location,
            size: cluster.members.len(),
            members: cluster.members.into_iter().map(ApiReport::from).collect(),
        }
    }
}

/// Body of `POST /api/moderation/accept` and
/// `POST /api/moderation/reject`: the member report IDs of the cluster
/// the operator decided on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationDecisionRequest {
    /// Report IDs from the reviewed cluster.
    pub report_ids: Vec<Uuid>,
}

/// Fan-out counts included in an accept response.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFanoutSummary {
    /// Subscribers read from the store.
    pub scanned: usize,
    /// Subscribers within the notify radius with a usable token.
    pub in_range: usize,
    /// Dispatches the push provider accepted.
    pub dispatched: usize,
}

/// Response of `POST /api/moderation/accept`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    /// ID of the published alert.
    pub alert_id: Uuid,
    /// Member reports removed (or already gone).
    pub deleted: usize,
    /// Member reports whose delete errored and which remain stored.
    pub failed_deletes: Vec<Uuid>,
    /// Fan-out counts; `None` when push is not configured or the pass
    /// aborted (see `fanoutError`).
    pub notified: Option<ApiFanoutSummary>,
    /// Reason the fan-out pass aborted, if it did. The alert is
    /// published either way.
    pub fanout_error: Option<String>,
}

/// Response of `POST /api/moderation/reject`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectResponse {
    /// Member reports removed (or already gone).
    pub deleted: usize,
    /// Member reports whose delete errored and which remain stored.
    pub failed_deletes: Vec<Uuid>,
}

/// Body of `PUT /api/subscribers/{userId}/location`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateRequest {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Body of `PUT /api/subscribers/{userId}/token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUpdateRequest {
    /// Device push token to register.
    pub push_token: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_report() -> RawReport {
        RawReport {
            id: Uuid::new_v4(),
            incident_type: IncidentType::RoadHazard,
            severity: IncidentSeverity::Moderate,
            location: "37.7749, -122.4194".to_string(),
            description: "debris in the left lane".to_string(),
            image_ref: None,
            submitter_id: "user-7".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn api_report_carries_severity_value() {
        let report = raw_report();
        let id = report.id;

        let api = ApiReport::from(report);

        assert_eq!(api.id, id);
        assert_eq!(api.severity, IncidentSeverity::Moderate);
        assert_eq!(api.severity_value, 2);
    }

    #[test]
    fn api_cluster_keeps_anchor_and_member_order() {
        let first = raw_report();
        let second = raw_report();
        let ids = vec![first.id, second.id];
        let cluster = AlertCluster::from_members(vec![first, second]).unwrap();

        let api = ApiCluster::from(cluster);

        assert_eq!(api.anchor_location, "37.7749, -122.4194");
        assert_eq!(api.size, 2);
        let api_ids: Vec<_> = api.members.iter().map(|m| m.id).collect();
        assert_eq!(api_ids, ids);
    }
}
