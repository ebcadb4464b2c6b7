//! Classification Service Module
//!
//! Boundary to the remote plant classification service. The service
//! contract is an explicit trinary: a call either resolves a subject,
//! resolves nothing (the image was not recognized), or fails — failure
//! never substitutes a made-up subject.

#[cfg(feature = "remote-http")]
pub mod http;
#[cfg(feature = "remote-http")]
pub use http::HttpClassifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult, SubjectId};

// =============================================================================
// Identification
// =============================================================================

/// Outcome of a successful classification call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    /// Identified subject, absent when the service recognized nothing
    pub subject_id: Option<SubjectId>,
}

impl Identification {
    /// A call that resolved a subject.
    pub fn resolved(subject_id: &str) -> Self {
        Self {
            subject_id: Some(subject_id.to_string()),
        }
    }

    /// A call that completed without recognizing a subject.
    pub fn unresolved() -> Self {
        Self { subject_id: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.subject_id.is_some()
    }
}

// =============================================================================
// Classifier Trait
// =============================================================================

/// Remote classification service boundary.
#[async_trait]
pub trait PlantClassifier: Send + Sync {
    /// Returns the classifier name
    fn name(&self) -> &str;

    /// Submits an image payload for identification.
    ///
    /// Transport errors, timeouts, and non-success responses all surface
    /// as [`CoreError::RemoteCallFailed`].
    async fn identify(&self, image: &[u8]) -> CoreResult<Identification>;
}

// =============================================================================
// Mock Classifier (for testing)
// =============================================================================

/// One scripted reply of the mock classifier.
#[derive(Clone, Debug)]
pub enum MockOutcome {
    /// Resolve the given subject
    Resolved(String),
    /// Complete without a subject
    Unresolved,
    /// Fail with `RemoteCallFailed`
    Fail,
}

/// Scriptable classifier for deterministic tests.
///
/// Scripted outcomes are consumed in order; once the script is empty,
/// every further call repeats the default outcome. Calls are counted so
/// tests can assert how many remote submissions a drain performed.
pub struct MockClassifier {
    script: std::sync::Mutex<std::collections::VecDeque<MockOutcome>>,
    default: MockOutcome,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockClassifier {
    /// Creates a mock that resolves `subj_mock` on every call.
    pub fn new() -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: MockOutcome::Resolved("subj_mock".to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Sets the outcome used once the script is exhausted.
    pub fn with_default(mut self, outcome: MockOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Appends a scripted outcome.
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Number of `identify` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlantClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn identify(&self, _image: &[u8]) -> CoreResult<Identification> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match outcome {
            MockOutcome::Resolved(subject) => Ok(Identification::resolved(&subject)),
            MockOutcome::Unresolved => Ok(Identification::unresolved()),
            MockOutcome::Fail => Err(CoreError::RemoteCallFailed(
                "mock classifier failure".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification_helpers() {
        assert!(Identification::resolved("subj_1").is_resolved());
        assert!(!Identification::unresolved().is_resolved());
    }

    #[tokio::test]
    async fn test_mock_default_resolves() {
        let mock = MockClassifier::new();

        let identification = mock.identify(&[1, 2, 3]).await.unwrap();
        assert_eq!(identification.subject_id.as_deref(), Some("subj_mock"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_script_is_consumed_in_order() {
        let mock = MockClassifier::new()
            .with_outcome(MockOutcome::Resolved("subj_a".to_string()))
            .with_outcome(MockOutcome::Fail)
            .with_outcome(MockOutcome::Unresolved);

        assert_eq!(
            mock.identify(&[]).await.unwrap().subject_id.as_deref(),
            Some("subj_a")
        );
        assert!(matches!(
            mock.identify(&[]).await.unwrap_err(),
            CoreError::RemoteCallFailed(_)
        ));
        assert!(mock.identify(&[]).await.unwrap().subject_id.is_none());

        // Script exhausted: falls back to the default.
        assert_eq!(
            mock.identify(&[]).await.unwrap().subject_id.as_deref(),
            Some("subj_mock")
        );
        assert_eq!(mock.calls(), 4);
    }

    #[tokio::test]
    async fn test_mock_failing_default() {
        let mock = MockClassifier::new().with_default(MockOutcome::Fail);

        assert!(mock.identify(&[]).await.is_err());
        assert!(mock.identify(&[]).await.is_err());
        assert_eq!(mock.calls(), 2);
    }
}
