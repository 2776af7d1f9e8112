//! Per-identifier mutual exclusion for archive jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::identifier::VideoId;

type LockMap = StdMutex<HashMap<VideoId, Arc<Mutex<()>>>>;

/// Ensures at most one job works on a given identifier at a time.
///
/// A second job for the same identifier waits until the first finishes, so
/// its presence check observes the first job's result instead of racing it
/// through path allocation. Entries exist only while a job holds or waits
/// for an identifier.
#[derive(Debug, Default)]
pub struct IdentifierLocks {
    locks: Arc<LockMap>,
}

impl IdentifierLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `id` is free and claim it.
    ///
    /// The claim is released when the returned guard is dropped.
    pub async fn acquire(&self, id: &VideoId) -> IdentifierGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        IdentifierGuard {
            id: id.clone(),
            locks: Arc::clone(&self.locks),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive claim on one identifier.
#[derive(Debug)]
pub struct IdentifierGuard {
    id: VideoId,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentifierGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts as a holder.
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own reference left means nobody is waiting.
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}
