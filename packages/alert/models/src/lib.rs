#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident taxonomy types and the canonical alert record formats.
//!
//! Every other blockwatch crate speaks in these types: raw reports submitted
//! by end users, published alerts produced by moderation, and the subscriber
//! records the proximity fan-out reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Severity level for an incident, from 1 (low) to 4 (critical).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    /// Level 1: Informational, no immediate risk
    Low = 1,
    /// Level 2: Worth knowing about, limited risk
    Moderate = 2,
    /// Level 3: Active risk to people or property
    High = 3,
    /// Level 4: Immediate danger, emergency response expected
    Critical = 4,
}

impl IncidentSeverity {
    /// Returns the numeric value of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Human-readable label used in notification copy.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Creates a severity level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-4.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Moderate),
            3 => Ok(Self::High),
            4 => Ok(Self::Critical),
            _ => Err(InvalidSeverityError { value }),
        }
    }
}

/// Error returned when attempting to create an [`IncidentSeverity`] from an
/// invalid numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-4", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// Category of a reported incident.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    /// Structure or vegetation fire
    Fire,
    /// Flooding or standing water hazard
    Flood,
    /// Traffic accident
    Accident,
    /// Criminal activity in progress or recently observed
    Crime,
    /// Electrical power outage
    PowerOutage,
    /// Road obstruction or dangerous road condition
    RoadHazard,
    /// Medical emergency
    Medical,
    /// Anything that doesn't fit the categories above
    Other,
}

impl IncidentType {
    /// Human-readable label used in notification copy.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fire => "Fire",
            Self::Flood => "Flood",
            Self::Accident => "Accident",
            Self::Crime => "Crime",
            Self::PowerOutage => "Power Outage",
            Self::RoadHazard => "Road Hazard",
            Self::Medical => "Medical Emergency",
            Self::Other => "Incident",
        }
    }

    /// Default severity assumed when a submitter doesn't pick one.
    #[must_use]
    pub const fn default_severity(self) -> IncidentSeverity {
        match self {
            Self::Fire | Self::Medical => IncidentSeverity::High,
            Self::Flood | Self::Accident | Self::Crime => IncidentSeverity::Moderate,
            Self::PowerOutage | Self::RoadHazard | Self::Other => IncidentSeverity::Low,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fire,
            Self::Flood,
            Self::Accident,
            Self::Crime,
            Self::PowerOutage,
            Self::RoadHazard,
            Self::Medical,
            Self::Other,
        ]
    }
}

/// An incident report exactly as a user submitted it.
///
/// Reports are read-only once created; moderation deletes them when their
/// cluster is accepted or rejected, and nothing else mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    /// Unique report ID.
    pub id: Uuid,
    /// Category of the reported incident.
    pub incident_type: IncidentType,
    /// Submitter-assessed severity.
    pub severity: IncidentSeverity,
    /// Free-form location text: coordinates, a maps URL, or a description.
    pub location: String,
    /// Free-form description of what was observed.
    pub description: String,
    /// Reference to an uploaded image, if the submitter attached one.
    pub image_ref: Option<String>,
    /// ID of the user who submitted the report.
    pub submitter_id: String,
    /// When the report was submitted.
    pub created_at: DateTime<Utc>,
}

/// A canonical alert produced by accepting a cluster of reports.
///
/// Created exactly once per accepted cluster and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedAlert {
    /// Unique alert ID.
    pub id: Uuid,
    /// Category carried over from the cluster's first report.
    pub incident_type: IncidentType,
    /// Severity carried over from the cluster's first report.
    pub severity: IncidentSeverity,
    /// Location text carried over from the cluster's first report.
    pub location: String,
    /// Pass-through or synthesized description.
    pub description: String,
    /// Image reference carried over from the cluster's first report.
    pub image_ref: Option<String>,
    /// Submitter of the cluster's first report.
    pub submitter_id: String,
    /// When the alert was published.
    pub created_at: DateTime<Utc>,
}

/// A push subscriber as stored by the subscriber store.
///
/// Location fields are written by the client's location tracking and only
/// read here; the push token is written on registration and cleared when
/// another device claims the same token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// Unique user ID.
    pub user_id: String,
    /// Device push token. `None` or empty means unreachable.
    pub push_token: Option<String>,
    /// Last known latitude (WGS84).
    pub latitude: Option<f64>,
    /// Last known longitude (WGS84).
    pub longitude: Option<f64>,
    /// Why the push token was cleared, if it was.
    pub token_cleared_reason: Option<String>,
    /// When the push token was cleared, if it was.
    pub token_cleared_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Creates an empty subscriber record with no token or location.
    #[must_use]
    pub const fn new(user_id: String) -> Self {
        Self {
            user_id,
            push_token: None,
            latitude: None,
            longitude: None,
            token_cleared_reason: None,
            token_cleared_at: None,
        }
    }
}

/// A partial update to a [`Subscriber`] record.
///
/// `None` fields are left unchanged. The push token is doubly optional so an
/// update can distinguish "leave the token alone" from "clear the token".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriberUpdate {
    /// New push token. `Some(None)` clears the stored token.
    pub push_token: Option<Option<String>>,
    /// New latitude.
    pub latitude: Option<f64>,
    /// New longitude.
    pub longitude: Option<f64>,
    /// New token-cleared reason.
    pub token_cleared_reason: Option<String>,
    /// New token-cleared timestamp.
    pub token_cleared_at: Option<DateTime<Utc>>,
}

impl SubscriberUpdate {
    /// Update that writes a push token.
    #[must_use]
    pub const fn token(token: String) -> Self {
        Self {
            push_token: Some(Some(token)),
            latitude: None,
            longitude: None,
            token_cleared_reason: None,
            token_cleared_at: None,
        }
    }

    /// Update that clears the push token and stamps why and when.
    #[must_use]
    pub const fn clear_token(reason: String, at: DateTime<Utc>) -> Self {
        Self {
            push_token: Some(None),
            latitude: None,
            longitude: None,
            token_cleared_reason: Some(reason),
            token_cleared_at: Some(at),
        }
    }

    /// Update that writes a location fix.
    #[must_use]
    pub const fn location(latitude: f64, longitude: f64) -> Self {
        Self {
            push_token: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            token_cleared_reason: None,
            token_cleared_at: None,
        }
    }

    /// Applies this update to a subscriber record in place.
    pub fn apply_to(&self, subscriber: &mut Subscriber) {
        if let Some(token) = &self.push_token {
            subscriber.push_token = token.clone();
        }
        if let Some(latitude) = self.latitude {
            subscriber.latitude = Some(latitude);
        }
        if let Some(longitude) = self.longitude {
            subscriber.longitude = Some(longitude);
        }
        if let Some(reason) = &self.token_cleared_reason {
            subscriber.token_cleared_reason = Some(reason.clone());
        }
        if let Some(at) = self.token_cleared_at {
            subscriber.token_cleared_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_from_value_roundtrip() {
        for v in 1..=4u8 {
            let severity = IncidentSeverity::from_value(v).unwrap();
            assert_eq!(severity.value(), v);
        }
        assert!(IncidentSeverity::from_value(0).is_err());
        assert!(IncidentSeverity::from_value(5).is_err());
    }

    #[test]
    fn every_incident_type_has_a_label() {
        for incident_type in IncidentType::all() {
            assert!(!incident_type.label().is_empty());
        }
    }

    #[test]
    fn incident_type_string_roundtrip() {
        assert_eq!(IncidentType::PowerOutage.to_string(), "POWER_OUTAGE");
        let back: IncidentType = "POWER_OUTAGE".parse().unwrap();
        assert_eq!(back, IncidentType::PowerOutage);
    }

    #[test]
    fn update_sets_token_without_touching_location() {
        let mut subscriber = Subscriber::new("user-1".to_string());
        subscriber.latitude = Some(37.0);
        subscriber.longitude = Some(-122.0);

        SubscriberUpdate::token("tok-abc".to_string()).apply_to(&mut subscriber);

        assert_eq!(subscriber.push_token.as_deref(), Some("tok-abc"));
        assert_eq!(subscriber.latitude, Some(37.0));
        assert_eq!(subscriber.longitude, Some(-122.0));
    }

    #[test]
    fn update_clears_token_and_stamps_reason() {
        let mut subscriber = Subscriber::new("user-1".to_string());
        subscriber.push_token = Some("tok-abc".to_string());
        let at = Utc::now();

        SubscriberUpdate::clear_token("claimed by another device".to_string(), at)
            .apply_to(&mut subscriber);

        assert_eq!(subscriber.push_token, None);
        assert_eq!(
            subscriber.token_cleared_reason.as_deref(),
            Some("claimed by another device")
        );
        assert_eq!(subscriber.token_cleared_at, Some(at));
    }

    #[test]
    fn default_update_changes_nothing() {
        let mut subscriber = Subscriber::new("user-1".to_string());
        subscriber.push_token = Some("tok-abc".to_string());
        let before = subscriber.clone();

        SubscriberUpdate::default().apply_to(&mut subscriber);

        assert_eq!(subscriber, before);
    }
}
