//! Content-addressed cache of compressed images.
//!
//! Maps the digest of a source image to the bytes the remote service returned
//! for it, and keeps a secondary index of output digests so that an input
//! which is itself a previous output can be recognized.
//!
//! [`CacheStore`] is the shared handle workers use. It owns the read/write
//! lock: any number of lookups may run at once, an insert runs alone.

mod backend;
mod error;
mod keyspace;
mod memory;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use keyspace::FjallCache;
pub use memory::MemoryCache;

use crate::hash::Digest;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One cached compression result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Digest of the raw input
    pub source: Digest,
    /// Digest of `data`
    pub dest: Digest,
    /// Compressed bytes
    pub data: Bytes,
}

type SharedBackend = Arc<RwLock<Box<dyn CacheBackend>>>;

/// Lock-guarded cache handle shared by all workers of a batch.
///
/// Backend calls do disk I/O (an insert syncs the journal), so each one runs
/// on the blocking pool and takes the lock there.
pub struct CacheStore {
    backend: SharedBackend,
}

impl CacheStore {
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self {
            backend: Arc::new(RwLock::new(Box::new(backend))),
        }
    }

    /// Non-persistent store
    pub fn in_memory() -> Self {
        Self::new(MemoryCache::new())
    }

    /// Look up compressed bytes by source digest (shared lock).
    pub async fn lookup_by_source(&self, source: Digest) -> Result<Option<Bytes>, CacheError> {
        self.read(move |backend| backend.lookup_by_source(source)).await
    }

    /// Check whether `digest` is the output of a recorded compression (shared lock).
    pub async fn exists_by_dest(&self, digest: Digest) -> Result<bool, CacheError> {
        self.read(move |backend| backend.exists_by_dest(digest)).await
    }

    /// Add a record (exclusive lock).
    pub async fn insert(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let record = record.clone();
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.blocking_write().insert(&record))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache task failed: {}", e)))?
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        self.read(|backend| backend.len()).await
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        self.read(|backend| backend.is_empty()).await
    }

    async fn read<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CacheBackend) -> Result<T, CacheError> + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || {
            let guard = backend.blocking_read();
            op(&**guard)
        })
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache task failed: {}", e)))?
    }
}
