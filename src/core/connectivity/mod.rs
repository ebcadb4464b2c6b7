//! Connectivity Monitor Module
//!
//! Two-state machine fed by the platform's connectivity events. The
//! monitor never polls: `observe` is the only transition source, which
//! keeps tests deterministic — any sequence of platform signals can be
//! replayed as plain calls. Current state is published on a watch
//! channel so the sync engine reads it without holding the monitor.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

// =============================================================================
// Connectivity State
// =============================================================================

/// Online/offline state as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    #[default]
    Offline,
}

impl ConnectivityState {
    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }
}

/// Outcome of feeding one platform signal into the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Offline -> Online: the one transition that triggers a sync.
    CameOnline,
    /// Online -> Offline.
    WentOffline,
    /// Duplicate signal; state did not change.
    Unchanged,
}

// =============================================================================
// Connectivity Monitor
// =============================================================================

/// Tracks connectivity transitions and publishes the current state.
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Creates a monitor seeded with the platform's live state at startup.
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current state.
    pub fn current(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Receiver observing every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Feeds one platform connectivity signal into the state machine.
    ///
    /// Duplicate signals collapse to `Unchanged`, so an `Online` event
    /// while already online cannot re-trigger a sync.
    pub fn observe(&self, next: ConnectivityState) -> Transition {
        let previous = *self.tx.borrow();
        if previous == next {
            return Transition::Unchanged;
        }

        self.tx.send_replace(next);
        info!("Connectivity changed: {:?} -> {:?}", previous, next);

        match next {
            ConnectivityState::Online => Transition::CameOnline,
            ConnectivityState::Offline => Transition::WentOffline,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
