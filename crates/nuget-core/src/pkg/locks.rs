//! Per-key mutex registry.

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Lazily creates one mutex per key and hands out the same mutex for the
/// lifetime of the registry.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the mutex for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(&lock);
        }
        Arc::clone(&self.locks.entry(key.to_string()).or_default())
    }

    /// Run `f` while holding the mutex for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.get(key);
        let _guard: MutexGuard<'_, ()> = lock.lock();
        f()
    }

    /// Number of keys that have a mutex.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
