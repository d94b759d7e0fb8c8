//! The coordinator lock.

use crate::domain::CombinedState;
use shared_types::Location;
use tokio::sync::{Mutex, MutexGuard};

/// Serializes every touch of the shared mining state.
///
/// Three things contend for this lock: slot updates from the
/// pending-header aggregator, the entire fan-out of a sealing result,
/// and location rebinding. Holding it across the dispatch fan-out is
/// deliberate: a sealed block must never be assembled from a body whose
/// header slots are mid-update.
pub struct CoordinatorState {
    combined: Mutex<CombinedState>,
}

impl CoordinatorState {
    /// Fresh state bound to the starting slice.
    pub fn new(location: Location) -> Self {
        Self {
            combined: Mutex::new(CombinedState::new(location)),
        }
    }

    /// Acquire the coordinator lock.
    pub async fn lock(&self) -> MutexGuard<'_, CombinedState> {
        self.combined.lock().await
    }
}
