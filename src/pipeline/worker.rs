//! Per-entry pipeline.
//!
//! Turns one [`Entry`] into one [`EntryResult`], stopping at the first
//! failure or at the first step that makes compression unnecessary:
//!
//! ```text
//! directory? -> noise path? -> read + hash -> image? -> cache by source
//!     -> cache by dest -> remote compress -> cache insert -> done
//! ```

use crate::archive::{Entry, EntryMeta, EntryPayload};
use crate::cache::{CacheRecord, CacheStore};
use crate::error::EntryError;
use crate::hash::{Digest, HashingWriter};
use crate::pipeline::channel::{EntryResult, Outcome, PassReason};
use crate::pipeline::filter::FilterPolicy;
use crate::pipeline::inflight::InFlight;
use crate::remote::Compressor;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on buffer presizing from an entry's declared size
const MAX_PRESIZE: u64 = 64 * 1024 * 1024;

/// Everything a worker shares with its siblings.
pub struct WorkerContext {
    pub cache: Arc<CacheStore>,
    pub compressor: Arc<dyn Compressor>,
    pub policy: FilterPolicy,
    inflight: InFlight,
}

impl WorkerContext {
    pub fn new(
        cache: Arc<CacheStore>,
        compressor: Arc<dyn Compressor>,
        policy: FilterPolicy,
    ) -> Self {
        Self {
            cache,
            compressor,
            policy,
            inflight: InFlight::new(),
        }
    }
}

/// Name used in results for an entry whose own name is empty.
pub fn result_name(index: usize, name: &str) -> String {
    if name.is_empty() {
        format!("<entry #{}>", index)
    } else {
        name.to_string()
    }
}

/// Run the pipeline for one entry. Always returns exactly one result.
pub async fn process_entry(ctx: &WorkerContext, entry: Entry) -> EntryResult {
    let (meta, payload) = entry.into_payload();

    if meta.name.is_empty() {
        return EntryResult::new(
            meta.index,
            result_name(meta.index, &meta.name),
            meta.is_dir,
            Outcome::Failed(EntryError::EmptyName),
        );
    }

    let outcome = run(ctx, &meta, payload).await;
    debug!(name = %meta.name, outcome = outcome_label(&outcome), "Entry processed");

    EntryResult::new(meta.index, meta.name, meta.is_dir, outcome)
}

async fn run(ctx: &WorkerContext, meta: &EntryMeta, payload: Box<dyn EntryPayload>) -> Outcome {
    if meta.is_dir {
        return Outcome::Directory;
    }

    if ctx.policy.is_noise(&meta.name) {
        return match read_plain(payload).await {
            Ok(data) => Outcome::Passthrough {
                data,
                reason: PassReason::Noise,
            },
            Err(e) => Outcome::Failed(EntryError::Read(e)),
        };
    }

    let (data, source) = match read_hashed(payload).await {
        Ok(read) => read,
        Err(e) => return Outcome::Failed(EntryError::Read(e)),
    };

    if !ctx.policy.is_image(&meta.name) {
        return Outcome::Passthrough {
            data,
            reason: PassReason::NotAnImage,
        };
    }

    // Held until the result is in the cache, so duplicates in this batch
    // wait and then hit the cache
    let _inflight = ctx.inflight.acquire(source).await;

    match ctx.cache.lookup_by_source(source).await {
        Ok(Some(cached)) => {
            debug!(name = %meta.name, %source, "Cache hit");
            return Outcome::CacheHit {
                data: cached,
                source_len: data.len() as u64,
            };
        }
        Ok(None) => {}
        Err(e) => warn!(name = %meta.name, %source, "Cache lookup failed: {}", e),
    }

    match ctx.cache.exists_by_dest(source).await {
        Ok(true) => {
            debug!(name = %meta.name, %source, "Cache hit, already compressed");
            return Outcome::Passthrough {
                data,
                reason: PassReason::AlreadyCompressed,
            };
        }
        Ok(false) => {}
        Err(e) => warn!(name = %meta.name, %source, "Cache lookup failed: {}", e),
    }

    let source_len = data.len() as u64;
    let compressed = match ctx.compressor.compress(data).await {
        Ok(compressed) => compressed,
        Err(e) => return Outcome::Failed(EntryError::Transform(e)),
    };

    let record = CacheRecord {
        source,
        dest: compressed.digest,
        data: compressed.data.clone(),
    };
    if let Err(e) = ctx.cache.insert(&record).await {
        // The result is still good; only later runs lose the hit
        warn!(name = %meta.name, %source, "Failed to store cache record: {}", e);
    }

    Outcome::Compressed {
        data: compressed.data,
        source,
        dest: compressed.digest,
        source_len,
    }
}

/// Read a payload on the blocking pool.
async fn read_plain(payload: Box<dyn EntryPayload>) -> io::Result<Bytes> {
    tokio::task::spawn_blocking(move || {
        let capacity = payload.size_hint().unwrap_or(0).min(MAX_PRESIZE) as usize;
        let mut buf = Vec::with_capacity(capacity);
        payload.copy_to(&mut buf)?;
        Ok(Bytes::from(buf))
    })
    .await
    .map_err(io::Error::other)?
}

/// Read a payload on the blocking pool, hashing it as it streams in.
async fn read_hashed(payload: Box<dyn EntryPayload>) -> io::Result<(Bytes, Digest)> {
    tokio::task::spawn_blocking(move || {
        let capacity = payload.size_hint().unwrap_or(0).min(MAX_PRESIZE) as usize;
        let mut writer = HashingWriter::with_capacity(capacity);
        payload.copy_to(&mut writer)?;
        Ok(writer.finish())
    })
    .await
    .map_err(io::Error::other)?
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Directory => "directory",
        Outcome::Passthrough {
            reason: PassReason::Noise,
            ..
        } => "noise",
        Outcome::Passthrough {
            reason: PassReason::NotAnImage,
            ..
        } => "passthrough",
        Outcome::Passthrough {
            reason: PassReason::AlreadyCompressed,
            ..
        } => "already-compressed",
        Outcome::CacheHit { .. } => "cache-hit",
        Outcome::Compressed { .. } => "compressed",
        Outcome::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheError, MemoryCache};
    use crate::remote::{Compressed, TransformError};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Compressor that keeps the first half of the input.
    #[derive(Default)]
    struct HalfCompressor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Compressor for HalfCompressor {
        async fn compress(&self, input: Bytes) -> Result<Compressed, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Compressed::new(input.slice(..input.len() / 2)))
        }
    }

    struct FailingCompressor;

    #[async_trait]
    impl Compressor for FailingCompressor {
        async fn compress(&self, _input: Bytes) -> Result<Compressed, TransformError> {
            Err(TransformError::Status {
                status: 429,
                body: "too many requests".to_string(),
            })
        }
    }

    /// Backend whose writes always fail
    struct ReadOnlyCache;

    impl CacheBackend for ReadOnlyCache {
        fn lookup_by_source(&self, _source: Digest) -> Result<Option<Bytes>, CacheError> {
            Ok(None)
        }
        fn exists_by_dest(&self, _dest: Digest) -> Result<bool, CacheError> {
            Ok(false)
        }
        fn insert(&mut self, _record: &CacheRecord) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("read-only".to_string()))
        }
        fn len(&self) -> Result<usize, CacheError> {
            Ok(0)
        }
    }

    struct BrokenPayload;

    impl EntryPayload for BrokenPayload {
        fn copy_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<u64> {
            out.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated entry"))
        }
    }

    fn context(cache: CacheStore, compressor: Arc<dyn Compressor>) -> WorkerContext {
        WorkerContext::new(Arc::new(cache), compressor, FilterPolicy::default())
    }

    #[tokio::test]
    async fn test_directory() {
        let ctx = context(CacheStore::in_memory(), Arc::new(HalfCompressor::default()));
        let result = process_entry(&ctx, Entry::dir(0, "images/")).await;

        assert_eq!(result.name, "images/");
        assert!(result.is_dir);
        assert!(matches!(result.outcome, Outcome::Directory));
    }

    #[tokio::test]
    async fn test_empty_name_fails_with_placeholder() {
        let ctx = context(CacheStore::in_memory(), Arc::new(HalfCompressor::default()));
        let result = process_entry(&ctx, Entry::file(7, "", &b"data"[..])).await;

        assert_eq!(result.name, "<entry #7>");
        assert!(matches!(result.error(), Some(EntryError::EmptyName)));
    }

    #[tokio::test]
    async fn test_noise_path_passes_through_untouched() {
        let compressor = Arc::new(HalfCompressor::default());
        let ctx = context(CacheStore::in_memory(), compressor.clone());
        let result = process_entry(&ctx, Entry::file(0, "__MACOSX/._a.png", &b"resource fork"[..])).await;

        match result.outcome {
            Outcome::Passthrough { data, reason } => {
                assert_eq!(&data[..], b"resource fork");
                assert_eq!(reason, PassReason::Noise);
            }
            other => panic!("Expected noise passthrough, got {:?}", other),
        }
        assert_eq!(compressor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_noise_filter_disabled_compresses() {
        let compressor = Arc::new(HalfCompressor::default());
        let ctx = WorkerContext::new(
            Arc::new(CacheStore::in_memory()),
            compressor.clone(),
            FilterPolicy::default().without_noise_filter(),
        );
        let result = process_entry(&ctx, Entry::file(0, "__MACOSX/a.png", &b"12345678"[..])).await;

        assert!(matches!(result.outcome, Outcome::Compressed { .. }));
        assert_eq!(compressor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let ctx = context(CacheStore::in_memory(), Arc::new(HalfCompressor::default()));
        let entry = Entry::new(2, "broken.png", false, Box::new(BrokenPayload));
        let result = process_entry(&ctx, entry).await;

        match result.error() {
            Some(EntryError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("Expected read error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_image_passes_through() {
        let compressor = Arc::new(HalfCompressor::default());
        let ctx = context(CacheStore::in_memory(), compressor.clone());
        let result = process_entry(&ctx, Entry::file(0, "b.txt", &b"plain text"[..])).await;

        match result.outcome {
            Outcome::Passthrough { data, reason } => {
                assert_eq!(&data[..], b"plain text");
                assert_eq!(reason, PassReason::NotAnImage);
            }
            other => panic!("Expected passthrough, got {:?}", other),
        }
        assert_eq!(compressor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compress_then_cache_hit() {
        let compressor = Arc::new(HalfCompressor::default());
        let ctx = context(CacheStore::in_memory(), compressor.clone());

        let first = process_entry(&ctx, Entry::file(0, "a.PNG", &b"abcdefgh"[..])).await;
        match &first.outcome {
            Outcome::Compressed {
                data,
                source,
                dest,
                source_len,
            } => {
                assert_eq!(&data[..], b"abcd");
                assert_eq!(*source, Digest::of(b"abcdefgh"));
                assert_eq!(*dest, Digest::of(b"abcd"));
                assert_eq!(*source_len, 8);
            }
            other => panic!("Expected compressed, got {:?}", other),
        }

        let second = process_entry(&ctx, Entry::file(1, "copy.png", &b"abcdefgh"[..])).await;
        match &second.outcome {
            Outcome::CacheHit { data, .. } => assert_eq!(&data[..], b"abcd"),
            other => panic!("Expected cache hit, got {:?}", other),
        }
        assert_eq!(compressor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_compressed_input() {
        let compressor = Arc::new(HalfCompressor::default());
        let cache = CacheStore::new(MemoryCache::with_records([CacheRecord {
            source: Digest::of(b"original"),
            dest: Digest::of(b"orig"),
            data: Bytes::from_static(b"orig"),
        }]));
        let ctx = context(cache, compressor.clone());

        let result = process_entry(&ctx, Entry::file(0, "out.jpg", &b"orig"[..])).await;
        match result.outcome {
            Outcome::Passthrough { data, reason } => {
                assert_eq!(&data[..], b"orig");
                assert_eq!(reason, PassReason::AlreadyCompressed);
            }
            other => panic!("Expected already-compressed passthrough, got {:?}", other),
        }
        assert_eq!(compressor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_source_hit_wins_over_dest_hit() {
        // Digest of "xy" is both a recorded source and a recorded dest
        let cache = CacheStore::new(MemoryCache::with_records([
            CacheRecord {
                source: Digest::of(b"xy"),
                dest: Digest::of(b"x"),
                data: Bytes::from_static(b"x"),
            },
            CacheRecord {
                source: Digest::of(b"wxyz"),
                dest: Digest::of(b"xy"),
                data: Bytes::from_static(b"xy"),
            },
        ]));
        let ctx = context(cache, Arc::new(HalfCompressor::default()));

        let result = process_entry(&ctx, Entry::file(0, "both.png", &b"xy"[..])).await;
        assert!(matches!(result.outcome, Outcome::CacheHit { .. }));
        assert_eq!(&result.data().unwrap()[..], b"x");
    }

    #[tokio::test]
    async fn test_remote_failure() {
        let ctx = context(CacheStore::in_memory(), Arc::new(FailingCompressor));
        let result = process_entry(&ctx, Entry::file(0, "a.png", &b"image"[..])).await;

        let err = result.error().unwrap();
        assert!(matches!(err, EntryError::Transform(TransformError::Status { status: 429, .. })));
        assert!(err.to_string().contains("too many requests"));
        assert!(ctx.cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_not_fatal() {
        let ctx = context(CacheStore::new(ReadOnlyCache), Arc::new(HalfCompressor::default()));
        let result = process_entry(&ctx, Entry::file(0, "a.jpg", &b"abcdef"[..])).await;

        match result.outcome {
            Outcome::Compressed { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("Expected compressed, got {:?}", other),
        }
    }

    #[test]
    fn test_result_name() {
        assert_eq!(result_name(3, "a.png"), "a.png");
        assert_eq!(result_name(3, ""), "<entry #3>");
    }
}
