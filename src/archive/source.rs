//! Input entries.

use super::ArchiveError;
use bytes::Bytes;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use zip::ZipArchive;

/// Raw bytes of one entry, streamed out exactly once.
pub trait EntryPayload: Send {
    /// Copy the entry's bytes into `out`, returning how many were written.
    fn copy_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<u64>;

    /// Uncompressed size if known up front, used to presize buffers.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl EntryPayload for Bytes {
    fn copy_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<u64> {
        out.write_all(&self)?;
        Ok(self.len() as u64)
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// One logical file or directory of the input.
pub struct Entry {
    /// Position in the input
    pub index: usize,
    pub name: String,
    pub is_dir: bool,
    payload: Box<dyn EntryPayload>,
}

impl Entry {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        is_dir: bool,
        payload: Box<dyn EntryPayload>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            is_dir,
            payload,
        }
    }

    /// File entry with in-memory contents
    pub fn file(index: usize, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(index, name, false, Box::new(data.into()))
    }

    /// Directory entry
    pub fn dir(index: usize, name: impl Into<String>) -> Self {
        Self::new(index, name, true, Box::new(Bytes::new()))
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.payload.size_hint()
    }

    /// Split into metadata and payload.
    pub fn into_payload(self) -> (EntryMeta, Box<dyn EntryPayload>) {
        (
            EntryMeta {
                index: self.index,
                name: self.name,
                is_dir: self.is_dir,
            },
            self.payload,
        )
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("is_dir", &self.is_dir)
            .finish_non_exhaustive()
    }
}

/// Entry metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub index: usize,
    pub name: String,
    pub is_dir: bool,
}

/// Reader over a zip archive held in memory.
///
/// The archive bytes are shared, so every entry gets its own cheap clone of
/// the archive and entries can be decompressed on different threads.
#[derive(Debug)]
pub struct ZipSource {
    archive: ZipArchive<Cursor<Bytes>>,
}

impl ZipSource {
    /// Read and index the archive at `path`.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let data = fs::read(path).map_err(|source| ArchiveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(Bytes::from(data))
    }

    pub fn from_bytes(data: Bytes) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        Ok(Self { archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// All entries in archive order.
    pub fn entries(&self) -> Result<Vec<Entry>, ArchiveError> {
        let mut archive = self.archive.clone();
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            // Raw access reads the header without decompressing
            let file = archive.by_index_raw(index)?;
            let payload = ZipPayload {
                archive: self.archive.clone(),
                index,
                size: file.size(),
            };
            entries.push(Entry::new(
                index,
                file.name(),
                file.is_dir(),
                Box::new(payload),
            ));
        }

        Ok(entries)
    }
}

struct ZipPayload {
    archive: ZipArchive<Cursor<Bytes>>,
    index: usize,
    size: u64,
}

impl EntryPayload for ZipPayload {
    fn copy_to(mut self: Box<Self>, out: &mut dyn Write) -> io::Result<u64> {
        let mut file = self.archive.by_index(self.index).map_err(io::Error::other)?;
        io::copy(&mut file, out)
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}
