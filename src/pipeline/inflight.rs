//! Per-digest locks for images being compressed right now.
//!
//! Two copies of the same image in one batch would both miss the cache if
//! they ran side by side. The second copy waits here until the first has
//! stored its result, then finds it in the cache.

use crate::hash::Digest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct InFlight {
    locks: Mutex<HashMap<Digest, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other worker holds `digest`, then hold it.
    pub async fn acquire(&self, digest: Digest) -> InFlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(digest).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;

        InFlightGuard {
            owner: self,
            digest,
            lock,
            guard: Some(guard),
        }
    }

    /// Digests currently held or waited on
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

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    digest: Digest,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here: nobody is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.digest);
        }
    }
}
