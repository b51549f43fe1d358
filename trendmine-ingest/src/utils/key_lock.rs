//! Per-key async mutexes
//!
//! Serializes work on one logical key (a project name, a project/language
//! pair) inside this process while unrelated keys proceed in parallel.
//! Entries are held weakly, so a key's mutex is dropped once no one holds it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;

type Slot = tokio::sync::Mutex<()>;

/// Map of lazily created, weakly held mutexes keyed by `K`
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Weak<Slot>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    ///
    /// The lock is released when the returned guard drops.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = self.slot(key);
        slot.lock_owned().await
    }

    fn slot(&self, key: K) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = slots.get(&key).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);

        let slot = Arc::new(Slot::new(()));
        slots.insert(key, Arc::downgrade(&slot));
        slot
    }

    /// Number of keys with a live mutex
    #[cfg(test)]
    fn active_keys(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
