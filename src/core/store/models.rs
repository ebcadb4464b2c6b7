//! Capture Store Models
//!
//! Row types for the two durable collections.

use serde::{Deserialize, Serialize};

use crate::core::{new_id, now_millis, CaptureId, EpochMillis, GeoPoint, RecordId, SubjectId};

// =============================================================================
// Pending Capture
// =============================================================================

/// A captured photo waiting for submission to the classification service.
///
/// Immutable once created: a pending capture is either deleted after a
/// successful sync or retained unchanged for the next attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCapture {
    /// Unique capture ID
    pub id: CaptureId,
    /// Raw photo payload
    pub image_data: Vec<u8>,
    /// Creation time in epoch milliseconds (processing order key)
    pub created_at: EpochMillis,
    /// Geolocation captured at submission time, if available
    pub location: Option<GeoPoint>,
}

impl PendingCapture {
    /// Creates a new pending capture with a fresh id and current timestamp.
    pub fn new(image_data: Vec<u8>, location: Option<GeoPoint>) -> Self {
        Self {
            id: new_id(),
            image_data,
            created_at: now_millis(),
            location,
        }
    }
}

// =============================================================================
// History Record
// =============================================================================

/// One resolved identification attempt.
///
/// Records are append-only: never updated or deleted after the write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Unique record ID, independent of the originating capture's id
    pub id: RecordId,
    /// Identified subject, absent when the service could not resolve one
    pub subject_id: Option<SubjectId>,
    /// The image that produced this result
    pub image_data: Vec<u8>,
    /// Time the result was produced, in epoch milliseconds
    pub created_at: EpochMillis,
    /// Geolocation carried over from the originating capture
    pub location: Option<GeoPoint>,
}

impl HistoryRecord {
    /// Creates a new history record for a freshly produced result.
    pub fn new(subject_id: Option<SubjectId>, image_data: Vec<u8>, location: Option<GeoPoint>) -> Self {
        Self {
            id: new_id(),
            subject_id,
            image_data,
            created_at: now_millis(),
            location,
        }
    }

    /// Builds the record that resolves a pending capture.
    ///
    /// The image payload and location carry over; the id and timestamp
    /// are fresh, since the record marks the result, not the capture.
    pub fn from_capture(capture: &PendingCapture, subject_id: Option<SubjectId>) -> Self {
        Self::new(subject_id, capture.image_data.clone(), capture.location)
    }
}
