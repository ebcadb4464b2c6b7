//! Capture Engine Module
//!
//! The root service the client shells drive. A submitted photo is
//! identified directly while online; offline (or when the direct call
//! fails) it is queued durably instead, and the queue drains through
//! the same remote path when connectivity returns. Whatever happens,
//! a submitted capture ends up either identified in history or queued —
//! never dropped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::classify::PlantClassifier;
use crate::core::connectivity::{ConnectivityMonitor, ConnectivityState, Transition};
use crate::core::history::HistoryLedger;
use crate::core::location::{bounded_location, LocationSource};
use crate::core::queue::CaptureQueue;
use crate::core::settings::EngineSettings;
use crate::core::store::{CaptureStore, HistoryRecord};
use crate::core::sync::{DrainReport, SyncEngine};
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Submit Outcome
// =============================================================================

/// What happened to a submitted capture.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Identified right away; the record is already in history.
    Identified { record: HistoryRecord },
    /// Queued for later sync; `pending` is the updated queue depth.
    Queued { pending: usize },
}

// =============================================================================
// Capture Engine
// =============================================================================

/// Root service: capture submission, connectivity-driven sync, history.
pub struct CaptureEngine {
    queue: CaptureQueue,
    ledger: HistoryLedger,
    classifier: Arc<dyn PlantClassifier>,
    location: Arc<dyn LocationSource>,
    monitor: ConnectivityMonitor,
    sync: SyncEngine,
    location_wait: Duration,
}

impl CaptureEngine {
    /// Wires an engine over the given store and collaborators.
    ///
    /// `initial` is the platform's live connectivity state at startup.
    pub fn new(
        store: Arc<CaptureStore>,
        classifier: Arc<dyn PlantClassifier>,
        location: Arc<dyn LocationSource>,
        initial: ConnectivityState,
        settings: &EngineSettings,
    ) -> Self {
        let queue = CaptureQueue::new(Arc::clone(&store));
        let ledger = HistoryLedger::new(store);
        let monitor = ConnectivityMonitor::new(initial);
        let sync = SyncEngine::new(
            queue.clone(),
            ledger.clone(),
            Arc::clone(&classifier),
            monitor.subscribe(),
        );

        Self {
            queue,
            ledger,
            classifier,
            location,
            monitor,
            sync,
            location_wait: Duration::from_millis(settings.capture.location_wait_ms),
        }
    }

    /// Submits a captured photo for identification.
    ///
    /// Attaches a best-effort location first (bounded wait — an absent
    /// provider never blocks submission). Online captures go straight to
    /// the remote service; offline captures, and online captures whose
    /// remote call or history write fails, are queued for retry.
    pub async fn submit(&self, image: Vec<u8>) -> CoreResult<SubmitOutcome> {
        if image.is_empty() {
            return Err(CoreError::ValidationError(
                "Capture image payload is empty".to_string(),
            ));
        }

        let location = bounded_location(self.location.as_ref(), self.location_wait).await;

        if !self.monitor.current().is_online() {
            let pending = self.queue.enqueue(image, location)?;
            info!("Offline capture queued ({} pending)", pending);
            return Ok(SubmitOutcome::Queued { pending });
        }

        match self.identify_now(&image, location).await {
            Ok(record) => Ok(SubmitOutcome::Identified { record }),
            Err(e) if e.is_retryable() => {
                warn!("Direct identification failed, queueing capture: {}", e);
                let pending = self.queue.enqueue(image, location)?;
                Ok(SubmitOutcome::Queued { pending })
            }
            Err(e) => Err(e),
        }
    }

    async fn identify_now(
        &self,
        image: &[u8],
        location: Option<crate::core::GeoPoint>,
    ) -> CoreResult<HistoryRecord> {
        let identification = self.classifier.identify(image).await?;
        let record = HistoryRecord::new(identification.subject_id, image.to_vec(), location);
        self.ledger.append(&record)?;
        Ok(record)
    }

    /// Feeds a platform connectivity signal into the engine.
    ///
    /// An `Offline -> Online` transition runs exactly one drain; any
    /// other signal (including duplicate `Online` events) does nothing.
    /// Drain failures are absorbed here — a broken sync must not crash
    /// the platform event that reported connectivity.
    pub async fn set_connectivity(&self, state: ConnectivityState) -> Option<DrainReport> {
        match self.monitor.observe(state) {
            Transition::CameOnline => match self.sync.drain().await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Sync after reconnect failed: {}", e);
                    None
                }
            },
            Transition::WentOffline | Transition::Unchanged => None,
        }
    }

    /// Manually retries the pending queue (the "retry now" affordance).
    pub async fn retry_pending(&self) -> CoreResult<DrainReport> {
        self.sync.drain().await
    }

    /// Current connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        self.monitor.current()
    }

    /// Current pending-queue depth, derived from storage.
    pub fn pending_count(&self) -> CoreResult<usize> {
        self.queue.count()
    }

    /// Identification history, newest first.
    pub fn history(&self) -> CoreResult<Vec<HistoryRecord>> {
        self.ledger.list_newest_first()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::{MockClassifier, MockOutcome};
    use crate::core::location::{FixedLocationSource, NullLocationSource};
    use crate::core::GeoPoint;

    fn engine(classifier: MockClassifier, state: ConnectivityState) -> (CaptureEngine, Arc<MockClassifier>) {
        let store = Arc::new(CaptureStore::in_memory().unwrap());
        let classifier = Arc::new(classifier);
        let engine = CaptureEngine::new(
            store,
            Arc::clone(&classifier) as Arc<dyn PlantClassifier>,
            Arc::new(NullLocationSource),
            state,
            &EngineSettings::default(),
        );
        (engine, classifier)
    }

    #[tokio::test]
    async fn test_online_submit_identifies_directly() {
        let (engine, _) = engine(MockClassifier::new(), ConnectivityState::Online);

        let outcome = engine.submit(vec![1, 2, 3]).await.unwrap();

        let SubmitOutcome::Identified { record } = outcome else {
            panic!("expected direct identification");
        };
        assert_eq!(record.subject_id.as_deref(), Some("subj_mock"));
        assert_eq!(engine.pending_count().unwrap(), 0);
        assert_eq!(engine.history().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_submit_queues() {
        let (engine, classifier) = engine(MockClassifier::new(), ConnectivityState::Offline);

        let outcome = engine.submit(vec![1]).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Queued { pending: 1 });
        assert_eq!(classifier.calls(), 0);
        assert!(engine.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_direct_submit_queues_instead() {
        let classifier = MockClassifier::new().with_outcome(MockOutcome::Fail);
        let (engine, _) = engine(classifier, ConnectivityState::Online);

        let outcome = engine.submit(vec![1]).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Queued { pending: 1 });
        assert!(engine.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_drains_queue() {
        let (engine, _) = engine(MockClassifier::new(), ConnectivityState::Offline);
        engine.submit(vec![1]).await.unwrap();
        engine.submit(vec![2]).await.unwrap();

        let report = engine.set_connectivity(ConnectivityState::Online).await;

        assert_eq!(
            report,
            Some(DrainReport {
                resolved: 2,
                still_pending: 0
            })
        );
        assert_eq!(engine.pending_count().unwrap(), 0);
        assert_eq!(engine.history().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_online_signal_does_not_resync() {
        let (engine, classifier) = engine(MockClassifier::new(), ConnectivityState::Offline);
        engine.submit(vec![1]).await.unwrap();

        engine.set_connectivity(ConnectivityState::Online).await;
        let calls_after_first = classifier.calls();

        let report = engine.set_connectivity(ConnectivityState::Online).await;
        assert!(report.is_none());
        assert_eq!(classifier.calls(), calls_after_first);
    }

    #[tokio::test]
    async fn test_going_offline_does_not_sync() {
        let (engine, classifier) = engine(MockClassifier::new(), ConnectivityState::Online);

        let report = engine.set_connectivity(ConnectivityState::Offline).await;

        assert!(report.is_none());
        assert_eq!(classifier.calls(), 0);
        assert_eq!(engine.connectivity(), ConnectivityState::Offline);
    }

    #[tokio::test]
    async fn test_manual_retry() {
        let classifier = MockClassifier::new().with_outcome(MockOutcome::Fail);
        let (engine, _) = engine(classifier, ConnectivityState::Online);
        engine.submit(vec![1]).await.unwrap();
        assert_eq!(engine.pending_count().unwrap(), 1);

        let report = engine.retry_pending().await.unwrap();

        assert_eq!(report.resolved, 1);
        assert_eq!(engine.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_location_is_attached_when_available() {
        let store = Arc::new(CaptureStore::in_memory().unwrap());
        let engine = CaptureEngine::new(
            store,
            Arc::new(MockClassifier::new()),
            Arc::new(FixedLocationSource::new(GeoPoint::new(12.9, 77.6))),
            ConnectivityState::Online,
            &EngineSettings::default(),
        );

        let outcome = engine.submit(vec![1]).await.unwrap();

        let SubmitOutcome::Identified { record } = outcome else {
            panic!("expected direct identification");
        };
        assert_eq!(record.location, Some(GeoPoint::new(12.9, 77.6)));
    }

    #[tokio::test]
    async fn test_empty_image_is_rejected() {
        let (engine, _) = engine(MockClassifier::new(), ConnectivityState::Online);

        assert!(matches!(
            engine.submit(Vec::new()).await,
            Err(CoreError::ValidationError(_))
        ));
    }
}
