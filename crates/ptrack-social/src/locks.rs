use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ptrack_types::SocialListKey;

/// One mutex per social list identity, created on first use.
///
/// Snapshots for different lists reconcile in parallel; snapshots for the
/// same list run one after another.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<SocialListKey, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `key`, created on first use.
    pub fn lock_for(&self, key: SocialListKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }

    /// Forget the lock for a list that no longer exists. A holder of the
    /// old lock keeps it until released.
    pub fn remove(&self, key: &SocialListKey) -> bool {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Number of list identities with a lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
