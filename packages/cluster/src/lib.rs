#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Seed-anchored proximity clustering of incident reports.
//!
//! Groups pending reports that describe the same incident so moderation
//! can review one cluster instead of N duplicates. The first unclustered
//! report becomes the seed; every remaining report near the *seed* joins
//! its cluster. Grouping is deliberately not transitive: report B within
//! radius of seed A joins A's cluster, while report C within radius of B
//! but not of A starts a different cluster. Only the seed is ever used as
//! the reference point, which keeps clusters anchored to the report the
//! operator actually sees first.
//!
//! When a location fails to parse on either side of a comparison, the
//! raw location strings are compared case-insensitively instead, so
//! "Outside the old mill" still groups with "outside the old mill".

use blockwatch_alert_models::RawReport;
use blockwatch_geo::{NormalizedCoordinate, distance_km, parse_location};

/// Default radius for considering two reports duplicates of the same
/// incident.
pub const DEDUP_RADIUS_KM: f64 = 5.0;

/// A group of reports judged to describe the same incident.
///
/// Transient: recomputed from the live pending list on every moderation
/// queue load and never persisted. Member order is seed first, then
/// discovery order during the scan. Membership is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCluster {
    /// Reports in this cluster, seed first.
    pub members: Vec<RawReport>,
    /// Raw location text of the seed report.
    pub anchor_location: String,
}

impl AlertCluster {
    fn new(seed: RawReport) -> Self {
        let anchor_location = seed.location.clone();
        Self {
            members: vec![seed],
            anchor_location,
        }
    }

    /// Rebuilds a cluster from members selected earlier, e.g. a decision
    /// made over a previously loaded queue. The first member is the seed.
    /// Returns `None` for an empty member list.
    #[must_use]
    pub fn from_members(members: Vec<RawReport>) -> Option<Self> {
        let anchor_location = members.first()?.location.clone();
        Some(Self {
            members,
            anchor_location,
        })
    }

    /// Number of reports in this cluster.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Clusters reports by proximity to each cluster's seed.
///
/// Clusters are emitted in seed-removal order, which matches the input
/// order of their seeds. Runs in O(n²); moderation queues are tens to low
/// hundreds of reports.
#[must_use]
pub fn cluster_reports(reports: Vec<RawReport>, radius_km: f64) -> Vec<AlertCluster> {
    let mut working = reports;
    let mut clusters = Vec::new();

    while !working.is_empty() {
        let seed = working.remove(0);
        let seed_coord = parse_location(&seed.location).ok();
        let mut cluster = AlertCluster::new(seed);

        let (matched, rest): (Vec<_>, Vec<_>) = working.into_iter().partition(|report| {
            is_nearby(seed_coord, &cluster.anchor_location, report, radius_km)
        });

        cluster.members.extend(matched);
        clusters.push(cluster);
        working = rest;
    }

    clusters
}

/// Nearby test against the seed: haversine distance when both locations
/// parse, case-insensitive raw-string equality when either side doesn't.
fn is_nearby(
    seed_coord: Option<NormalizedCoordinate>,
    seed_location: &str,
    candidate: &RawReport,
    radius_km: f64,
) -> bool {
    if let Some(seed_coord) = seed_coord {
        if let Ok(candidate_coord) = parse_location(&candidate.location) {
            return distance_km(seed_coord, candidate_coord) <= radius_km;
        }
    }

    seed_location.to_lowercase() == candidate.location.to_lowercase()
}
