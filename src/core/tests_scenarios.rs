//! End-to-End Capture Lifecycle Tests
//!
//! Exercises the whole engine — store, queue, ledger, monitor, sync —
//! over an in-memory store and a scripted classifier: no loss, no
//! duplication, ordering, stop-on-failure, and single-drain behavior
//! across connectivity changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::classify::{Identification, MockClassifier, MockOutcome, PlantClassifier};
use crate::core::connectivity::ConnectivityState;
use crate::core::engine::{CaptureEngine, SubmitOutcome};
use crate::core::location::NullLocationSource;
use crate::core::settings::EngineSettings;
use crate::core::store::CaptureStore;
use crate::core::sync::DrainReport;
use crate::core::CoreResult;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

struct Harness {
    store: Arc<CaptureStore>,
    classifier: Arc<MockClassifier>,
    engine: CaptureEngine,
}

fn harness(classifier: MockClassifier, state: ConnectivityState) -> Harness {
    init_tracing();

    let store = Arc::new(CaptureStore::in_memory().unwrap());
    let classifier = Arc::new(classifier);
    let engine = CaptureEngine::new(
        Arc::clone(&store),
        Arc::clone(&classifier) as Arc<dyn PlantClassifier>,
        Arc::new(NullLocationSource),
        state,
        &EngineSettings::default(),
    );

    Harness {
        store,
        classifier,
        engine,
    }
}

impl Harness {
    /// Payloads currently in the pending queue, processing order.
    fn pending_payloads(&self) -> Vec<Vec<u8>> {
        self.store
            .all_pending()
            .unwrap()
            .into_iter()
            .map(|c| c.image_data)
            .collect()
    }

    /// Payloads currently in history, oldest first.
    fn history_payloads(&self) -> Vec<Vec<u8>> {
        let mut payloads: Vec<Vec<u8>> = self
            .store
            .all_history()
            .unwrap()
            .into_iter()
            .map(|r| r.image_data)
            .collect();
        payloads.reverse();
        payloads
    }

    /// Asserts every submitted payload sits in exactly one collection.
    fn assert_no_loss_no_duplication(&self, submitted: &[Vec<u8>]) {
        let pending = self.pending_payloads();
        let history = self.history_payloads();

        assert_eq!(
            pending.len() + history.len(),
            submitted.len(),
            "every capture must be in exactly one collection"
        );
        for payload in submitted {
            let in_pending = pending.contains(payload);
            let in_history = history.contains(payload);
            assert!(
                in_pending ^ in_history,
                "capture {:?} must be in exactly one of pending/history",
                payload
            );
        }
    }
}

// =============================================================================
// P1/P2: no loss, no duplication
// =============================================================================

#[tokio::test]
async fn scenario_no_capture_lost_or_duplicated_across_mixed_drains() {
    let classifier = MockClassifier::new()
        .with_outcome(MockOutcome::Resolved("subj_1".to_string()))
        .with_outcome(MockOutcome::Fail);
    let h = harness(classifier, ConnectivityState::Offline);

    let submitted: Vec<Vec<u8>> = (1..=4u8).map(|i| vec![i; 4]).collect();
    for payload in &submitted {
        h.engine.submit(payload.clone()).await.unwrap();
    }
    h.assert_no_loss_no_duplication(&submitted);

    // First drain resolves one capture, then hits the scripted failure.
    h.engine.set_connectivity(ConnectivityState::Online).await;
    h.assert_no_loss_no_duplication(&submitted);
    assert_eq!(h.pending_payloads().len(), 3);

    // Retry resolves the rest (script exhausted, default succeeds).
    h.engine.retry_pending().await.unwrap();
    h.assert_no_loss_no_duplication(&submitted);
    assert_eq!(h.pending_payloads().len(), 0);
    assert_eq!(h.history_payloads().len(), 4);
}

// =============================================================================
// P3: ordering
// =============================================================================

#[tokio::test]
async fn scenario_history_preserves_capture_order() {
    let h = harness(MockClassifier::new(), ConnectivityState::Offline);

    h.engine.submit(vec![1]).await.unwrap();
    h.engine.submit(vec![2]).await.unwrap();
    h.engine.submit(vec![3]).await.unwrap();

    h.engine.set_connectivity(ConnectivityState::Online).await;

    assert_eq!(h.history_payloads(), vec![vec![1], vec![2], vec![3]]);
}

// =============================================================================
// P4: stop on failure
// =============================================================================

#[tokio::test]
async fn scenario_failure_on_second_capture_stops_the_cycle() {
    let classifier = MockClassifier::new()
        .with_outcome(MockOutcome::Resolved("subj_a".to_string()))
        .with_outcome(MockOutcome::Fail);
    let h = harness(classifier, ConnectivityState::Offline);

    h.engine.submit(vec![0xA]).await.unwrap();
    h.engine.submit(vec![0xB]).await.unwrap();
    h.engine.submit(vec![0xC]).await.unwrap();

    let report = h.engine.set_connectivity(ConnectivityState::Online).await;

    assert_eq!(
        report,
        Some(DrainReport {
            resolved: 1,
            still_pending: 2
        })
    );
    assert_eq!(h.history_payloads(), vec![vec![0xA]]);
    assert_eq!(h.pending_payloads(), vec![vec![0xB], vec![0xC]]);
    // The third capture was never submitted in this cycle.
    assert_eq!(h.classifier.calls(), 2);
}

// =============================================================================
// P5: idempotent delete
// =============================================================================

#[tokio::test]
async fn scenario_removing_an_absent_pending_id_is_a_no_op() {
    let h = harness(MockClassifier::new(), ConnectivityState::Offline);
    h.engine.submit(vec![1]).await.unwrap();

    let id = h.store.all_pending().unwrap()[0].id.clone();
    h.store.delete_pending(&id).unwrap();
    h.store.delete_pending(&id).unwrap();
    h.store.delete_pending(&"never-existed".to_string()).unwrap();

    assert_eq!(h.store.count_pending().unwrap(), 0);
}

// =============================================================================
// P6: at most one drain
// =============================================================================

/// Classifier that holds each call open long enough for a second
/// trigger to arrive mid-drain.
struct SlowClassifier {
    inner: MockClassifier,
    delay: Duration,
}

#[async_trait]
impl PlantClassifier for SlowClassifier {
    fn name(&self) -> &str {
        "slow-mock"
    }

    async fn identify(&self, image: &[u8]) -> CoreResult<Identification> {
        tokio::time::sleep(self.delay).await;
        self.inner.identify(image).await
    }
}

#[tokio::test]
async fn scenario_duplicate_online_events_trigger_one_drain() {
    let h = harness(MockClassifier::new(), ConnectivityState::Offline);
    h.engine.submit(vec![1]).await.unwrap();
    h.engine.submit(vec![2]).await.unwrap();

    let first = h.engine.set_connectivity(ConnectivityState::Online).await;
    let second = h.engine.set_connectivity(ConnectivityState::Online).await;

    assert!(first.is_some());
    assert!(second.is_none());
    // One drain cycle's worth of remote calls, not two.
    assert_eq!(h.classifier.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_concurrent_triggers_run_one_drain_cycle() {
    init_tracing();

    let store = Arc::new(CaptureStore::in_memory().unwrap());
    let classifier = Arc::new(SlowClassifier {
        inner: MockClassifier::new(),
        delay: Duration::from_secs(1),
    });
    let engine = CaptureEngine::new(
        Arc::clone(&store),
        Arc::clone(&classifier) as Arc<dyn PlantClassifier>,
        Arc::new(NullLocationSource),
        ConnectivityState::Online,
        &EngineSettings::default(),
    );

    let queue = crate::core::queue::CaptureQueue::new(Arc::clone(&store));
    queue.enqueue(vec![1], None).unwrap();

    // Rapid flapping: both triggers race, the second finds the drain
    // lock held and backs off.
    let (first, second) = tokio::join!(engine.retry_pending(), engine.retry_pending());

    let reports = [first.unwrap(), second.unwrap()];
    assert!(reports.contains(&DrainReport {
        resolved: 1,
        still_pending: 0
    }));
    assert!(reports.contains(&DrainReport {
        resolved: 0,
        still_pending: 1
    }));
    assert_eq!(classifier.inner.calls(), 1);
}

// =============================================================================
// §8 scenarios
// =============================================================================

#[tokio::test]
async fn scenario_offline_capture_syncs_after_reconnect() {
    let classifier =
        MockClassifier::new().with_outcome(MockOutcome::Resolved("subj_neem".to_string()));
    let h = harness(classifier, ConnectivityState::Offline);

    let image = vec![0xDE, 0xAD, 0xBE, 0xEF];
    let outcome = h.engine.submit(image.clone()).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued { pending: 1 });

    h.engine.set_connectivity(ConnectivityState::Online).await;

    assert_eq!(h.engine.pending_count().unwrap(), 0);
    let history = h.engine.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].image_data, image);
    assert_eq!(history[0].subject_id.as_deref(), Some("subj_neem"));
}

#[tokio::test]
async fn scenario_unresolved_capture_still_lands_in_history() {
    let classifier = MockClassifier::new().with_default(MockOutcome::Unresolved);
    let h = harness(classifier, ConnectivityState::Offline);

    h.engine.submit(vec![7]).await.unwrap();
    h.engine.set_connectivity(ConnectivityState::Online).await;

    let history = h.engine.history().unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].subject_id.is_none());
}

#[tokio::test]
async fn scenario_partial_drain_splits_collections_cleanly() {
    let classifier = MockClassifier::new()
        .with_outcome(MockOutcome::Resolved("subj_a".to_string()))
        .with_outcome(MockOutcome::Fail);
    let h = harness(classifier, ConnectivityState::Offline);

    let image_a = vec![0xAA];
    let image_b = vec![0xBB];
    h.engine.submit(image_a.clone()).await.unwrap();
    h.engine.submit(image_b.clone()).await.unwrap();

    h.engine.set_connectivity(ConnectivityState::Online).await;

    assert_eq!(h.history_payloads(), vec![image_a]);
    assert_eq!(h.pending_payloads(), vec![image_b]);
}

// =============================================================================
// Restart durability
// =============================================================================

#[tokio::test]
async fn scenario_queue_survives_restart_and_drains() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("captures.db");

    // First session: capture offline, then the app dies.
    {
        let store = Arc::new(CaptureStore::open(&db_path).unwrap());
        let engine = CaptureEngine::new(
            store,
            Arc::new(MockClassifier::new()),
            Arc::new(NullLocationSource),
            ConnectivityState::Offline,
            &EngineSettings::default(),
        );
        engine.submit(vec![0x11]).await.unwrap();
        engine.submit(vec![0x22]).await.unwrap();
    }

    // Second session: the queue is still there and drains on reconnect.
    let store = Arc::new(CaptureStore::open(&db_path).unwrap());
    let engine = CaptureEngine::new(
        Arc::clone(&store),
        Arc::new(MockClassifier::new()),
        Arc::new(NullLocationSource),
        ConnectivityState::Offline,
        &EngineSettings::default(),
    );
    assert_eq!(engine.pending_count().unwrap(), 2);

    let report = engine.set_connectivity(ConnectivityState::Online).await;
    assert_eq!(
        report,
        Some(DrainReport {
            resolved: 2,
            still_pending: 0
        })
    );
    assert_eq!(engine.history().unwrap().len(), 2);
}
