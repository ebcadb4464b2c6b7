//! Sync Engine Module
//!
//! Drains the pending capture queue against the remote classification
//! service. One drain cycle works over a snapshot of the queue, oldest
//! capture first, strictly serially. A capture leaves the queue only
//! after its history record is durably written; any remote or history
//! failure stops the cycle and leaves the remainder pending for the
//! next trigger — a capture is never discarded on failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::classify::PlantClassifier;
use crate::core::connectivity::ConnectivityState;
use crate::core::history::HistoryLedger;
use crate::core::queue::CaptureQueue;
use crate::core::store::HistoryRecord;
use crate::core::CoreResult;

// =============================================================================
// Drain Report
// =============================================================================

/// Aggregate outcome of one drain trigger.
///
/// Per-item remote/history failures are absorbed here; they never
/// surface as individual errors. A trigger that found nothing to do
/// (offline, or a drain already running) reports zero resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Captures moved into history during this cycle
    pub resolved: usize,
    /// Captures still queued after this cycle
    pub still_pending: usize,
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Drives pending captures through the remote classification path.
pub struct SyncEngine {
    queue: CaptureQueue,
    ledger: HistoryLedger,
    classifier: Arc<dyn PlantClassifier>,
    connectivity: watch::Receiver<ConnectivityState>,
    /// Held for the whole cycle; `try_lock` makes concurrent triggers
    /// no-ops instead of queued duplicates.
    drain_guard: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    /// Creates a sync engine over the given collections and service.
    pub fn new(
        queue: CaptureQueue,
        ledger: HistoryLedger,
        classifier: Arc<dyn PlantClassifier>,
        connectivity: watch::Receiver<ConnectivityState>,
    ) -> Self {
        Self {
            queue,
            ledger,
            classifier,
            connectivity,
            drain_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Attempts to resolve all currently pending captures, in order.
    ///
    /// Storage failures propagate to the caller; remote and history
    /// failures end the cycle early and are reflected only in the
    /// report's `still_pending` count.
    pub async fn drain(&self) -> CoreResult<DrainReport> {
        let Ok(_guard) = self.drain_guard.try_lock() else {
            debug!("Drain already in progress, ignoring trigger");
            return self.idle_report();
        };

        if !self.connectivity.borrow().is_online() {
            debug!("Drain requested while offline, nothing to do");
            return self.idle_report();
        }

        // Snapshot: captures enqueued mid-cycle wait for the next trigger.
        let snapshot = self.queue.list_ordered()?;
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }

        info!("Draining {} pending capture(s)", snapshot.len());

        let mut resolved = 0;
        for capture in &snapshot {
            let identification = match self.classifier.identify(&capture.image_data).await {
                Ok(identification) => identification,
                Err(e) => {
                    // A shared outage would fail the rest of the queue
                    // too; stop and retry the whole tail next time.
                    warn!("Sync stopped at capture {}: {}", capture.id, e);
                    break;
                }
            };

            let record = HistoryRecord::from_capture(capture, identification.subject_id);
            if let Err(e) = self.ledger.append(&record) {
                warn!("Sync stopped at capture {}: {}", capture.id, e);
                break;
            }

            // The result is durably recorded; only now may the capture
            // leave the queue.
            self.queue.remove(&capture.id)?;
            resolved += 1;
        }

        let still_pending = self.queue.count()?;
        info!(
            "Drain finished: {} resolved, {} still pending",
            resolved, still_pending
        );

        Ok(DrainReport {
            resolved,
            still_pending,
        })
    }

    fn idle_report(&self) -> CoreResult<DrainReport> {
        Ok(DrainReport {
            resolved: 0,
            still_pending: self.queue.count()?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::{MockClassifier, MockOutcome};
    use crate::core::connectivity::ConnectivityMonitor;
    use crate::core::store::CaptureStore;

    struct Fixture {
        queue: CaptureQueue,
        ledger: HistoryLedger,
        classifier: Arc<MockClassifier>,
        monitor: ConnectivityMonitor,
        engine: SyncEngine,
    }

    fn fixture(classifier: MockClassifier, state: ConnectivityState) -> Fixture {
        let store = Arc::new(CaptureStore::in_memory().unwrap());
        let queue = CaptureQueue::new(Arc::clone(&store));
        let ledger = HistoryLedger::new(store);
        let classifier = Arc::new(classifier);
        let monitor = ConnectivityMonitor::new(state);

        let engine = SyncEngine::new(
            queue.clone(),
            ledger.clone(),
            Arc::clone(&classifier) as Arc<dyn PlantClassifier>,
            monitor.subscribe(),
        );

        Fixture {
            queue,
            ledger,
            classifier,
            monitor,
            engine,
        }
    }

    #[tokio::test]
    async fn test_drain_moves_all_captures_to_history() {
        let f = fixture(MockClassifier::new(), ConnectivityState::Online);
        f.queue.enqueue(vec![1], None).unwrap();
        f.queue.enqueue(vec![2], None).unwrap();

        let report = f.engine.drain().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                resolved: 2,
                still_pending: 0
            }
        );
        assert_eq!(f.queue.count().unwrap(), 0);
        assert_eq!(f.ledger.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drain_offline_is_a_no_op() {
        let f = fixture(MockClassifier::new(), ConnectivityState::Offline);
        f.queue.enqueue(vec![1], None).unwrap();

        let report = f.engine.drain().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                resolved: 0,
                still_pending: 1
            }
        );
        // No wasted remote calls while offline.
        assert_eq!(f.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_drain_sees_live_connectivity() {
        let f = fixture(MockClassifier::new(), ConnectivityState::Offline);
        f.queue.enqueue(vec![1], None).unwrap();

        f.monitor.observe(ConnectivityState::Online);

        let report = f.engine.drain().await.unwrap();
        assert_eq!(report.resolved, 1);
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_failure() {
        let classifier = MockClassifier::new()
            .with_outcome(MockOutcome::Resolved("subj_a".to_string()))
            .with_outcome(MockOutcome::Fail);
        let f = fixture(classifier, ConnectivityState::Online);

        f.queue.enqueue(vec![1], None).unwrap();
        f.queue.enqueue(vec![2], None).unwrap();
        f.queue.enqueue(vec![3], None).unwrap();

        let report = f.engine.drain().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                resolved: 1,
                still_pending: 2
            }
        );
        // The third capture was never submitted in this cycle.
        assert_eq!(f.classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_drain_keeps_captures_for_retry() {
        let classifier = MockClassifier::new().with_outcome(MockOutcome::Fail);
        let f = fixture(classifier, ConnectivityState::Online);
        f.queue.enqueue(vec![1], None).unwrap();

        f.engine.drain().await.unwrap();
        assert_eq!(f.queue.count().unwrap(), 1);
        assert_eq!(f.ledger.count().unwrap(), 0);

        // Script exhausted: the retry succeeds and empties the queue.
        let report = f.engine.drain().await.unwrap();
        assert_eq!(report.resolved, 1);
        assert_eq!(f.queue.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_identification_still_clears_capture() {
        let classifier = MockClassifier::new().with_default(MockOutcome::Unresolved);
        let f = fixture(classifier, ConnectivityState::Online);
        f.queue.enqueue(vec![1], None).unwrap();

        let report = f.engine.drain().await.unwrap();

        assert_eq!(report.resolved, 1);
        let history = f.ledger.list_newest_first().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].subject_id.is_none());
    }

    #[tokio::test]
    async fn test_drain_on_empty_queue() {
        let f = fixture(MockClassifier::new(), ConnectivityState::Online);

        let report = f.engine.drain().await.unwrap();

        assert_eq!(report, DrainReport::default());
        assert_eq!(f.classifier.calls(), 0);
    }
}
