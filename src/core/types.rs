//! PlantFinder Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Pending capture unique identifier (ULID)
pub type CaptureId = String;

/// History record unique identifier (ULID)
pub type RecordId = String;

/// Botanical subject identifier in the external catalog
pub type SubjectId = String;

/// Generates a fresh ULID string.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

// =============================================================================
// Time
// =============================================================================

/// Timestamp in Unix epoch milliseconds
pub type EpochMillis = i64;

/// Current time in Unix epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Geolocation
// =============================================================================

/// Geocoordinate pair attached to a capture when the platform location
/// signal answered within the bounded wait.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}
