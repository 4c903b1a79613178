//! Per-pool serialization.
//!
//! Reconciliation reads the member count and then acts on it. Two calls for
//! the same pool must not interleave between the read and the act, so every
//! call holds the pool's lock for its whole read-decide-act sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed in-process locks, one per pool base name.
#[derive(Debug, Clone, Default)]
pub struct PoolLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held while a pool is being reconciled.
#[derive(Debug)]
pub struct PoolGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl PoolGuard {
    /// The pool this guard serializes.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PoolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        // Entries only referenced by the map are idle.
        map.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);

        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for and take the lock for `key`.
    pub async fn acquire(&self, key: &str) -> PoolGuard {
        let lock = self.entry(key);
        PoolGuard {
            key: key.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Take the lock for `key` only if nobody holds it.
    pub fn try_acquire(&self, key: &str) -> Option<PoolGuard> {
        let lock = self.entry(key);
        lock.try_lock_owned().ok().map(|guard| PoolGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Number of pools with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
