//! Generic reloadable config store.
//!
//! `ConfigStore<T>` wraps `Arc<RwLock<T>>` with a version counter so a
//! SIGHUP reload can swap a section while readers keep whatever snapshot
//! they already took.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};

/// A shared, versioned configuration value.
pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    data: RwLock<T>,
    version: AtomicU64,
}

impl<T> ConfigStore<T> {
    /// Create a new `ConfigStore` with the given initial value at version 0.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(ConfigStoreInner {
                data: RwLock::new(initial),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the stored value. Returns the new version.
    pub async fn update(&self, value: T) -> u64 {
        let mut guard = self.inner.data.write().await;
        *guard = value;
        self.inner.version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Read the current value.
    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read().await
    }

    /// Number of updates applied since construction.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Relaxed)
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone the current value out of the lock.
    pub async fn snapshot(&self) -> T {
        self.inner.data.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
