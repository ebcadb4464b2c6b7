//! Location Signal Module
//!
//! Best-effort geolocation attached to captures. The platform provider
//! is behind a trait so tests inject fixed or slow sources; the bounded
//! wait guarantees a missing or unresponsive provider never blocks an
//! enqueue or submission.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::GeoPoint;

// =============================================================================
// Location Source Trait
// =============================================================================

/// Platform location signal boundary.
///
/// Location is strictly best-effort: no error surface, just presence or
/// absence of a fix.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Current device position, if one is available.
    async fn current_location(&self) -> Option<GeoPoint>;
}

/// Waits for a location fix, but no longer than `wait`.
///
/// A timeout yields `None` — the capture proceeds without coordinates.
pub async fn bounded_location(source: &dyn LocationSource, wait: Duration) -> Option<GeoPoint> {
    tokio::time::timeout(wait, source.current_location())
        .await
        .unwrap_or(None)
}

// =============================================================================
// Built-in Sources
// =============================================================================

/// A source for platforms without a location signal.
pub struct NullLocationSource;

#[async_trait]
impl LocationSource for NullLocationSource {
    async fn current_location(&self) -> Option<GeoPoint> {
        None
    }
}

/// A source returning a fixed position (for testing).
pub struct FixedLocationSource {
    point: GeoPoint,
}

impl FixedLocationSource {
    pub fn new(point: GeoPoint) -> Self {
        Self { point }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn current_location(&self) -> Option<GeoPoint> {
        Some(self.point)
    }
}

// =============================================================================
// Tests
// =============================================================================
