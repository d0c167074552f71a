//! Poison-tolerant lock for process-local stores.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// An `RwLock` that keeps serving after a writer panicked.
///
/// A panic mid-operation can leave one key half-updated; every key is a cache
/// entry that the backing store can rebuild, so the store stays usable.
#[derive(Debug)]
pub(crate) struct StoreLock<T> {
    inner: RwLock<T>,
    owner: &'static str,
}

impl<T> StoreLock<T> {
    pub(crate) fn new(owner: &'static str, value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            owner,
        }
    }

    pub(crate) fn read(&self, op: &'static str) -> RwLockReadGuard<'_, T> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| self.recover(op, "read", poisoned))
    }

    pub(crate) fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, T> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| self.recover(op, "write", poisoned))
    }

    fn recover<G>(&self, op: &'static str, mode: &'static str, poisoned: PoisonError<G>) -> G {
        warn!(
            target = "cache::lock",
            store = self.owner,
            op,
            mode,
            "Recovered poisoned store lock"
        );
        poisoned.into_inner()
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &RwLock<T> {
        &self.inner
    }
}
