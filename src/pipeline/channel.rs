//! Channel and result types for the compression pipeline.
//!
//! N workers -> one collector, over a channel with room for a single result
//! so that a worker hands its result over only when the collector is ready.

use crate::error::EntryError;
use crate::hash::Digest;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Results buffered between the workers and the collector
pub const RESULT_CHANNEL_SIZE: usize = 1;

/// Report entry written when any entry failed
pub const ERROR_REPORT_NAME: &str = "errors_in_compress.txt";

// =============================================================================
// EntryResult: Worker -> Collector
// =============================================================================

/// The one result a worker produces for an entry.
#[derive(Debug)]
pub struct EntryResult {
    /// Position of the entry in the input
    pub index: usize,

    /// Entry name; never empty
    pub name: String,

    pub is_dir: bool,

    pub outcome: Outcome,
}

impl EntryResult {
    pub fn new(index: usize, name: impl Into<String>, is_dir: bool, outcome: Outcome) -> Self {
        Self {
            index,
            name: name.into(),
            is_dir,
            outcome,
        }
    }

    /// Bytes to write, if any
    pub fn data(&self) -> Option<&Bytes> {
        self.outcome.data()
    }

    pub fn error(&self) -> Option<&EntryError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// How an entry left the pipeline
#[derive(Debug)]
pub enum Outcome {
    /// Directories carry no payload and are not written
    Directory,

    /// Original bytes, unchanged
    Passthrough { data: Bytes, reason: PassReason },

    /// Compressed bytes from an earlier run
    CacheHit { data: Bytes, source_len: u64 },

    /// Freshly compressed by the remote service
    Compressed {
        data: Bytes,
        source: Digest,
        dest: Digest,
        source_len: u64,
    },

    Failed(EntryError),
}

impl Outcome {
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Outcome::Passthrough { data, .. }
            | Outcome::CacheHit { data, .. }
            | Outcome::Compressed { data, .. } => Some(data),
            Outcome::Directory | Outcome::Failed(_) => None,
        }
    }
}

/// Why an entry was passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Archive metadata or VCS path
    Noise,
    /// Extension is not a compressible image type
    NotAnImage,
    /// Input is the output of an earlier compression
    AlreadyCompressed,
}

// =============================================================================
// Channel types
// =============================================================================

/// Sender half held by the worker tasks
pub type ResultSender = mpsc::Sender<EntryResult>;

/// Receiver half drained by the collector
pub type ResultReceiver = mpsc::Receiver<EntryResult>;

/// Create the worker -> collector channel
pub fn result_channel() -> (ResultSender, ResultReceiver) {
    mpsc::channel(RESULT_CHANNEL_SIZE)
}

// =============================================================================
// Batch accounting
// =============================================================================

/// Failed entry, as listed in the error report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub index: usize,
    pub name: String,
    pub error: String,
}

/// Pass/fail accounting for one batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Results received
    pub total: usize,

    /// Entries written to the output
    pub written: usize,

    pub directories: usize,

    /// Compressed by the remote service in this run
    pub compressed: usize,

    /// Served from the cache
    pub cache_hits: usize,

    /// Recognized as an earlier output and left alone
    pub already_compressed: usize,

    /// Non-image or noise entries copied unchanged
    pub passthrough: usize,

    /// Entries listed in the error report
    pub failed: usize,

    /// Source bytes of compressed and cache-hit entries
    pub bytes_in: u64,

    /// Output bytes of compressed and cache-hit entries
    pub bytes_out: u64,

    /// Whether the error report was written
    pub report_written: bool,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes saved on images that went through compression
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }
}

// =============================================================================
// Tests
// =============================================================================
