//! In-memory cache backend.

use super::backend::CacheBackend;
use super::error::CacheError;
use super::CacheRecord;
use crate::hash::Digest;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// Non-persistent backend, used by tests and benches.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: HashMap<Digest, Bytes>,
    dest_index: HashSet<Digest>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated cache
    pub fn with_records(records: impl IntoIterator<Item = CacheRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.put(&record);
        }
        cache
    }

    fn put(&mut self, record: &CacheRecord) {
        if self.records.contains_key(&record.source) {
            return;
        }
        self.records.insert(record.source, record.data.clone());
        self.dest_index.insert(record.dest);
    }
}

impl CacheBackend for MemoryCache {
    fn lookup_by_source(&self, source: Digest) -> Result<Option<Bytes>, CacheError> {
        Ok(self.records.get(&source).cloned())
    }

    fn exists_by_dest(&self, dest: Digest) -> Result<bool, CacheError> {
        Ok(self.dest_index.contains(&dest))
    }

    fn insert(&mut self, record: &CacheRecord) -> Result<(), CacheError> {
        self.put(record);
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records.len())
    }
}
