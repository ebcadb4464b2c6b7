//! PlantFinder Capture Engine
//!
//! Core library for the PlantFinder identification client.
//! Captured photos are identified against a remote classification
//! service when the device is online, queued durably when it is not,
//! and drained back through the same remote path once connectivity
//! returns. Resolved identifications land in an append-only history.
//!
//! The UI layers (web and mobile shells) sit on top of
//! [`core::engine::CaptureEngine`]; everything platform-specific —
//! connectivity events, geolocation, the classification backend —
//! enters through the trait boundaries in [`core::classify`],
//! [`core::location`] and [`core::connectivity`].

pub mod core;

pub use crate::core::engine::{CaptureEngine, SubmitOutcome};
pub use crate::core::store::CaptureStore;
pub use crate::core::sync::DrainReport;
pub use crate::core::{CoreError, CoreResult};
