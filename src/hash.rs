//! Content hashing.
//!
//! Entries are identified by the XXH3-128 digest of their bytes. The same
//! digest is the cache key for the source image and the dedup key for
//! already-compressed outputs.

use bytes::Bytes;
use std::fmt;
use std::io::{self, Write};
use xxhash_rust::xxh3::{xxh3_128, Xxh3};

/// 128-bit content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(u128);

impl Digest {
    /// Digest size when stored as a key
    pub const LEN: usize = 16;

    /// Hash a byte slice in one shot.
    pub fn of(data: &[u8]) -> Self {
        Self(xxh3_128(data))
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Big-endian key bytes, so keys sort the same way digests do.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        self.0.to_be_bytes()
    }

    /// Parse key bytes written by [`Digest::to_bytes`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; Self::LEN] = bytes.try_into().ok()?;
        Some(Self(u128::from_be_bytes(raw)))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Writer that buffers everything written to it while hashing it.
///
/// Use this to hash an entry while it is being read, instead of reading the
/// whole entry and hashing it in a second pass.
pub struct HashingWriter {
    buf: Vec<u8>,
    hasher: Xxh3,
}

impl HashingWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            hasher: Xxh3::new(),
        }
    }

    /// Bytes buffered so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer, returning the buffered bytes and their digest.
    pub fn finish(self) -> (Bytes, Digest) {
        let digest = Digest(self.hasher.digest128());
        (Bytes::from(self.buf), digest)
    }
}

impl Default for HashingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for HashingWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.hasher.update(data);
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
