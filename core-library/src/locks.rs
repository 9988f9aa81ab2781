//! Per-key async write locks.
//!
//! Each key gets its own `tokio` mutex, created on first use and dropped
//! again once no guard or waiter refers to it, so the map only ever holds
//! keys with writes in flight.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive write access to one key; released on drop.
pub(crate) struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.entries
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let guard = self.slot(key).lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Take exclusive access to `key` only if nobody holds it.
    pub(crate) fn try_lock(&self, key: &str) -> Option<KeyGuard<'_>> {
        match self.slot(key).try_lock_owned() {
            Ok(guard) => Some(KeyGuard {
                locks: self,
                key: key.to_string(),
                guard: Some(guard),
            }),
            Err(_) => {
                self.release(key);
                None
            }
        }
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get(key) {
            if Arc::strong_count(slot) == 1 {
                entries.remove(key);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn active_keys(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.key);
    }
}
