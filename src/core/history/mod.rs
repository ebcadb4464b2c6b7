//! History Ledger Module
//!
//! Append-only record of resolved identifications. The ledger exposes no
//! update or delete surface — it is the permanent audit trail the
//! history drawer renders, newest scan first.

use std::sync::Arc;

use tracing::debug;

use crate::core::store::{CaptureStore, HistoryRecord};
use crate::core::{CoreError, CoreResult};

// =============================================================================
// History Ledger
// =============================================================================

/// Append-only ledger over the store's history collection.
#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<CaptureStore>,
}

impl HistoryLedger {
    /// Creates a ledger backed by the given store.
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self { store }
    }

    /// Appends a record to the ledger.
    ///
    /// A failure here must keep the originating capture pending, so it
    /// surfaces as `HistoryWriteFailed` — the retryable class.
    pub fn append(&self, record: &HistoryRecord) -> CoreResult<()> {
        self.store
            .put_history(record)
            .map_err(|e| CoreError::HistoryWriteFailed(e.to_string()))?;

        debug!(
            "Recorded identification {} (subject: {:?})",
            record.id, record.subject_id
        );
        Ok(())
    }

    /// All records, newest first.
    pub fn list_newest_first(&self) -> CoreResult<Vec<HistoryRecord>> {
        self.store.all_history()
    }

    /// Number of recorded identifications.
    pub fn count(&self) -> CoreResult<usize> {
        Ok(self.store.all_history()?.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(CaptureStore::in_memory().unwrap()))
    }

    #[test]
    fn test_append_and_list() {
        let ledger = ledger();

        let record = HistoryRecord::new(Some("subj_7".into()), vec![1, 2], None);
        ledger.append(&record).unwrap();

        let all = ledger.list_newest_first().unwrap();
        assert_eq!(all, vec![record]);
    }

    #[test]
    fn test_listing_is_newest_first() {
        let ledger = ledger();

        let mut older = HistoryRecord::new(None, vec![1], None);
        let mut newer = HistoryRecord::new(None, vec![2], None);
        older.created_at = 100;
        newer.created_at = 200;

        ledger.append(&older).unwrap();
        ledger.append(&newer).unwrap();

        let all = ledger.list_newest_first().unwrap();
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);
    }

    #[test]
    fn test_append_failure_maps_to_history_write_failed() {
        let ledger = ledger();

        let record = HistoryRecord::new(None, vec![1], None);
        ledger.append(&record).unwrap();

        // Same id again violates the primary key — the plain insert
        // refuses to overwrite an existing audit row.
        let err = ledger.append(&record).unwrap_err();
        assert!(matches!(err, CoreError::HistoryWriteFailed(_)));
    }

    #[test]
    fn test_count() {
        let ledger = ledger();
        assert_eq!(ledger.count().unwrap(), 0);

        ledger
            .append(&HistoryRecord::new(None, vec![1], None))
            .unwrap();
        assert_eq!(ledger.count().unwrap(), 1);
    }
}
