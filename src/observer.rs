//! Observer trait for submission state changes.
//!
//! Attach an [`Arc<dyn StateObserver>`] via
//! [`crate::Submission::with_observer`] to receive a fresh
//! [`StateSnapshot`] after every transition. This is how a presentation
//! layer (terminal spinner, GUI, web socket) follows the state without
//! reaching into it.
//!
//! # Example
//!
//! ```rust
//! use phasesim::{StateObserver, StateSnapshot};
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! struct LoadingFlag(AtomicBool);
//!
//! impl StateObserver for LoadingFlag {
//!     fn on_state_change(&self, snapshot: &StateSnapshot) {
//!         self.0.store(snapshot.loading, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::state::StateSnapshot;
use std::sync::{Arc, Mutex, PoisonError};

/// Called by [`crate::Submission`] as its state changes.
///
/// Notifications are delivered after the state lock is released, from
/// whichever task performed the transition. On a multi-threaded runtime two
/// overlapping intents may therefore deliver their snapshots out of order;
/// compare [`StateSnapshot::revision`] (or wrap in [`LatestSnapshot`]) to
/// keep only the newest. All methods default to no-ops.
pub trait StateObserver: Send + Sync {
    /// Called after every transition, including rejected selections.
    fn on_state_change(&self, snapshot: &StateSnapshot) {
        let _ = snapshot;
    }

    /// Called when a completion is discarded because a newer selection or
    /// processing request replaced it.
    fn on_superseded(&self, generation: u64) {
        let _ = generation;
    }
}

/// Observer that ignores everything. The default.
pub struct NoopObserver;

impl StateObserver for NoopObserver {}

/// Convenience alias for the type stored in [`crate::Submission`].
pub type SharedObserver = Arc<dyn StateObserver>;

/// Observer that keeps the newest snapshot it has been handed, ignoring any
/// that arrive after a later revision.
#[derive(Debug, Default)]
pub struct LatestSnapshot {
    latest: Mutex<Option<StateSnapshot>>,
}

impl LatestSnapshot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self) -> Option<StateSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateObserver for LatestSnapshot {
    fn on_state_change(&self, snapshot: &StateSnapshot) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.as_ref().is_none_or(|seen| snapshot.is_newer_than(seen)) {
            *latest = Some(snapshot.clone());
        }
    }
}
