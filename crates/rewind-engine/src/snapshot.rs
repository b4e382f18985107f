//! Single-slot store for the pre-reset position.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rewind_model::{is_restorable_position, PositionSnapshot, TargetIdentity};

/// Holds at most one [`PositionSnapshot`]. Written by the reset engine,
/// read by restore.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    slot: Mutex<Option<PositionSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with `position` for `target`. Non-finite and
    /// non-positive positions leave the slot untouched and return false.
    pub fn record(&self, target: &TargetIdentity, position: f64) -> bool {
        if !is_restorable_position(position) {
            return false;
        }
        *self.lock() = Some(PositionSnapshot::new(target.clone(), position));
        true
    }

    pub fn current(&self) -> Option<PositionSnapshot> {
        self.lock().clone()
    }

    /// The snapshot, if it belongs to `target` and holds a finite position.
    pub fn for_target(&self, target: &TargetIdentity) -> Option<PositionSnapshot> {
        self.lock()
            .as_ref()
            .filter(|s| &s.target == target && s.is_valid())
            .cloned()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<PositionSnapshot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
