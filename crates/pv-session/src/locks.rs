//! Per-user request serialization.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per key, created on demand and dropped once idle.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder of `key` remains.
    pub async fn lock(&self, key: i64) -> KeyGuard<'_> {
        let slot = self.slots.lock().entry(key).or_default().clone();
        let guard = slot.lock_owned().await;
        KeyGuard { locks: self, key, guard: Some(guard) }
    }

    /// Keys with a holder or waiter.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots.lock();
        // Clones are only taken under this map lock, so a count of one means no waiters.
        if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.key);
        }
    }
}
