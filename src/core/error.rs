//! PlantFinder Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The durable store could not be opened or upgraded. Fatal for the
    /// triggering operation; the caller must not assume the capture was
    /// persisted.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage operation failed: {0}")]
    StorageFailed(String),

    // =========================================================================
    // Sync Errors
    // =========================================================================
    /// Network error, timeout, or non-success response from the remote
    /// classification service. Recovered by leaving the item pending.
    #[error("Remote classification call failed: {0}")]
    RemoteCallFailed(String),

    /// The post-success write to the history ledger failed. Treated like
    /// `RemoteCallFailed` for retry purposes: the pending item is kept.
    #[error("History write failed: {0}")]
    HistoryWriteFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the failed operation should be retried on the next sync
    /// trigger rather than surfaced to the user as fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::RemoteCallFailed(_) | CoreError::HistoryWriteFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CoreError::RemoteCallFailed("timeout".into()).is_retryable());
        assert!(CoreError::HistoryWriteFailed("disk full".into()).is_retryable());
        assert!(!CoreError::StorageUnavailable("cannot open".into()).is_retryable());
        assert!(!CoreError::ValidationError("empty image".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::RemoteCallFailed("connection refused".into());
        assert_eq!(
            err.to_string(),
            "Remote classification call failed: connection refused"
        );
    }
}
