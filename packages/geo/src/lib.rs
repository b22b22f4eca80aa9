#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate normalization and great-circle distance.
//!
//! User-submitted locations arrive as free-form text: pasted coordinate
//! pairs, shared maps URLs, or plain descriptions that happen to contain
//! numbers. [`parse::parse_location`] turns that text into a
//! [`NormalizedCoordinate`] when it can, and [`distance::distance_km`]
//! measures haversine distance between two normalized points.

pub mod distance;
pub mod parse;

use thiserror::Error;

pub use distance::{EARTH_RADIUS_KM, distance_km};
pub use parse::parse_location;

/// A validated WGS84 coordinate pair.
///
/// The canonical textual form is the fixed 6-decimal `"lat,lon"` string
/// produced by the [`std::fmt::Display`] impl; that string is what gets
/// stored on published alerts and compared for equality elsewhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCoordinate {
    /// Latitude in degrees, always within [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, always within [-180, 180].
    pub longitude: f64,
}

impl NormalizedCoordinate {
    /// Creates a coordinate after range validation.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::OutOfRange`] if the latitude is outside
    /// [-90, 90] or the longitude is outside [-180, 180].
    pub const fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if latitude < -90.0 || latitude > 90.0 || longitude < -180.0 || longitude > 180.0 {
            return Err(CoordinateError::OutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl std::fmt::Display for NormalizedCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Errors from coordinate extraction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    /// No coordinate pattern could be extracted from the input.
    #[error("no coordinate pair found in {input:?}")]
    Unparsable {
        /// The location text that failed to parse.
        input: String,
    },

    /// A pair was extracted but failed range validation.
    #[error("coordinate ({latitude}, {longitude}) out of range")]
    OutOfRange {
        /// The rejected latitude.
        latitude: f64,
        /// The rejected longitude.
        longitude: f64,
    },
}
