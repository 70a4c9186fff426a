//! Cache backend trait.

use super::error::CacheError;
use super::CacheRecord;
use crate::hash::Digest;
use bytes::Bytes;

/// Storage behind a [`CacheStore`](super::CacheStore).
///
/// Backends do no locking of their own for correctness: the store hands out
/// `&self` for lookups under its read guard and `&mut self` for inserts
/// under its write guard.
pub trait CacheBackend: Send + Sync {
    /// Compressed bytes recorded for a source digest.
    fn lookup_by_source(&self, source: Digest) -> Result<Option<Bytes>, CacheError>;

    /// Whether any record produced `dest` as its output.
    fn exists_by_dest(&self, dest: Digest) -> Result<bool, CacheError>;

    /// Add a record. Records are never overwritten: inserting a source
    /// digest that is already present leaves the existing record in place.
    fn insert(&mut self, record: &CacheRecord) -> Result<(), CacheError>;

    /// Number of records.
    fn len(&self) -> Result<usize, CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
