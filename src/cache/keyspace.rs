//! fjall backend for the cache store.
//!
//! Layout:
//!
//! ```text
//! records:    source digest (16 bytes, BE) -> compressed bytes
//! dest_index: dest digest   (16 bytes, BE) -> source digest
//! ```
//!
//! Both rows of a record are written in one batch, so a crash never leaves a
//! `dest_index` row without its record.

use super::backend::CacheBackend;
use super::error::CacheError;
use super::CacheRecord;
use crate::hash::Digest;
use bytes::Bytes;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};

const RECORDS_PARTITION: &str = "records";
const DEST_INDEX_PARTITION: &str = "dest_index";

/// Persistent cache backed by a fjall keyspace directory.
pub struct FjallCache {
    path: PathBuf,
    keyspace: Keyspace,
    records: PartitionHandle,
    dest_index: PartitionHandle,
}

impl FjallCache {
    /// Open or create the keyspace at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let keyspace = Config::new(path).open()?;
        let records = keyspace.open_partition(RECORDS_PARTITION, PartitionCreateOptions::default())?;
        let dest_index =
            keyspace.open_partition(DEST_INDEX_PARTITION, PartitionCreateOptions::default())?;

        tracing::debug!(path = %path.display(), "Opened cache keyspace");

        Ok(Self {
            path: path.to_path_buf(),
            keyspace,
            records,
            dest_index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheBackend for FjallCache {
    fn lookup_by_source(&self, source: Digest) -> Result<Option<Bytes>, CacheError> {
        let value = self.records.get(source.to_bytes())?;
        Ok(value.map(|v| Bytes::copy_from_slice(&v)))
    }

    fn exists_by_dest(&self, dest: Digest) -> Result<bool, CacheError> {
        let Some(source) = self.dest_index.get(dest.to_bytes())? else {
            return Ok(false);
        };

        if Digest::from_slice(&source).is_none() {
            return Err(CacheError::Corrupt {
                key: dest.to_string(),
                reason: format!("dest_index value is {} bytes", source.len()),
            });
        }
        Ok(true)
    }

    fn insert(&mut self, record: &CacheRecord) -> Result<(), CacheError> {
        let source_key = record.source.to_bytes();
        if self.records.contains_key(source_key)? {
            return Ok(());
        }

        let mut batch = self.keyspace.batch();
        batch.insert(&self.records, &source_key[..], &record.data[..]);
        batch.insert(&self.dest_index, &record.dest.to_bytes()[..], &source_key[..]);
        batch.commit()?;

        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(source: &[u8], output: &'static [u8]) -> CacheRecord {
        CacheRecord {
            source: Digest::of(source),
            dest: Digest::of(output),
            data: Bytes::from_static(output),
        }
    }

    #[test]
    fn test_lookup_after_insert() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FjallCache::open(&tmp.path().join("img.db")).unwrap();

        let rec = record(b"raw png", b"small png");
        assert!(cache.lookup_by_source(rec.source).unwrap().is_none());
        assert!(!cache.exists_by_dest(rec.dest).unwrap());

        cache.insert(&rec).unwrap();

        assert_eq!(
            cache.lookup_by_source(rec.source).unwrap(),
            Some(Bytes::from_static(b"small png"))
        );
        assert!(cache.exists_by_dest(rec.dest).unwrap());
        // The source digest is not a destination digest
        assert!(!cache.exists_by_dest(rec.source).unwrap());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_insert_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FjallCache::open(&tmp.path().join("img.db")).unwrap();

        let first = record(b"raw", b"first output");
        let second = CacheRecord {
            source: first.source,
            dest: Digest::of(b"second output"),
            data: Bytes::from_static(b"second output"),
        };

        cache.insert(&first).unwrap();
        cache.insert(&second).unwrap();

        assert_eq!(
            cache.lookup_by_source(first.source).unwrap(),
            Some(Bytes::from_static(b"first output"))
        );
        assert!(!cache.exists_by_dest(second.dest).unwrap());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("img.db");
        let rec = record(b"raw jpg", b"small jpg");

        {
            let mut cache = FjallCache::open(&path).unwrap();
            cache.insert(&rec).unwrap();
        }

        let cache = FjallCache::open(&path).unwrap();
        assert_eq!(cache.path(), path.as_path());
        assert_eq!(
            cache.lookup_by_source(rec.source).unwrap(),
            Some(Bytes::from_static(b"small jpg"))
        );
        assert!(cache.exists_by_dest(rec.dest).unwrap());
    }
}
