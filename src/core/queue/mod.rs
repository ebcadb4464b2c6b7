//! Capture Queue Module
//!
//! Ordering semantics over the pending collection. Captures are
//! processed oldest-first; the queue never caches counts — every answer
//! is derived from storage so restarts and concurrent enqueues cannot
//! desynchronize it.

use std::sync::Arc;

use tracing::debug;

use crate::core::store::{CaptureStore, PendingCapture};
use crate::core::{CaptureId, CoreResult, GeoPoint};

// =============================================================================
// Capture Queue
// =============================================================================

/// Queue manager over the store's pending collection.
#[derive(Clone)]
pub struct CaptureQueue {
    store: Arc<CaptureStore>,
}

impl CaptureQueue {
    /// Creates a queue backed by the given store.
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self { store }
    }

    /// Persists a new capture and returns the updated pending count.
    ///
    /// Works against whatever is already queued — captures left over
    /// from a previous session stay ahead of this one in the order.
    pub fn enqueue(
        &self,
        image_data: Vec<u8>,
        location: Option<GeoPoint>,
    ) -> CoreResult<usize> {
        let capture = PendingCapture::new(image_data, location);
        self.store.put_pending(&capture)?;

        let pending = self.store.count_pending()?;
        debug!("Queued capture {} ({} pending)", capture.id, pending);

        Ok(pending)
    }

    /// Pending captures in processing order: `created_at` ascending,
    /// same-millisecond ties broken by enqueue order. This is the order
    /// the sync engine consumes.
    pub fn list_ordered(&self) -> CoreResult<Vec<PendingCapture>> {
        self.store.all_pending()
    }

    /// Removes a capture from the queue. Idempotent: removing an id that
    /// is no longer queued is a no-op.
    pub fn remove(&self, id: &CaptureId) -> CoreResult<()> {
        self.store.delete_pending(id)
    }

    /// Current queue depth.
    pub fn count(&self) -> CoreResult<usize> {
        self.store.count_pending()
    }
}

// =============================================================================
// Tests
// =============================================================================
