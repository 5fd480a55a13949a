//! Per-(property, period) run locks.
//!
//! One reconciliation run at a time per property-period; a second
//! request while a run is in flight is rejected rather than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tieout_core::PeriodKey;
use uuid::Uuid;

type Key = (Uuid, PeriodKey);

/// Registry of in-flight runs. Cheap to clone; clones share the set.
#[derive(Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<Key>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the lock for a property-period. `None` when a run
    /// is already in flight. The claim is released when the returned
    /// guard drops, panicking evaluation included.
    pub fn acquire(&self, property_id: Uuid, period: PeriodKey) -> Option<RunLockGuard> {
        let key = (property_id, period);
        let mut held = match self.held.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !held.insert(key) {
            return None;
        }
        Some(RunLockGuard { locks: self.held.clone(), key })
    }

    pub fn is_held(&self, property_id: Uuid, period: PeriodKey) -> bool {
        let held = match self.held.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.contains(&(property_id, period))
    }
}

pub struct RunLockGuard {
    locks: Arc<Mutex<HashSet<Key>>>,
    key: Key,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let mut held = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_rejected_until_guard_drops() {
        let locks = RunLocks::new();
        let pid = Uuid::new_v4();
        let period = PeriodKey::new(2025, 7);

        let guard = locks.acquire(pid, period);
        assert!(guard.is_some());
        assert!(locks.acquire(pid, period).is_none());
        assert!(locks.is_held(pid, period));

        drop(guard);
        assert!(!locks.is_held(pid, period));
        assert!(locks.acquire(pid, period).is_some());
    }

    #[test]
    fn distinct_periods_and_properties_do_not_contend() {
        let locks = RunLocks::new();
        let pid = Uuid::new_v4();
        let _july = locks.acquire(pid, PeriodKey::new(2025, 7)).unwrap();
        assert!(locks.acquire(pid, PeriodKey::new(2025, 6)).is_some());
        assert!(locks.acquire(Uuid::new_v4(), PeriodKey::new(2025, 7)).is_some());
    }

    #[test]
    fn clones_share_the_registry() {
        let locks = RunLocks::new();
        let pid = Uuid::new_v4();
        let period = PeriodKey::new(2025, 7);
        let _guard = locks.acquire(pid, period).unwrap();

        let clone = locks.clone();
        assert!(clone.acquire(pid, period).is_none());
    }
}
