//! Output entries.

use super::ArchiveError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Destination for finished entries. Only the collector writes to it.
pub trait EntrySink {
    /// Add a file entry.
    fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError>;
}

/// Zip archive writer.
///
/// Entry names must be unique; a repeated name is refused before anything
/// is written for it.
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    options: SimpleFileOptions,
    names: HashSet<String>,
}

impl ZipSink<File> {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::create(path).map_err(|source| ArchiveError::Write {
            path: PathBuf::from(path),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: ZipWriter::new(inner),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            names: HashSet::new(),
        }
    }

    /// Write the central directory and return the underlying writer.
    pub fn finish(self) -> Result<W, ArchiveError> {
        Ok(self.writer.finish()?)
    }
}

impl<W: Write + Seek> EntrySink for ZipSink<W> {
    fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
        if self.names.contains(name) {
            return Err(ArchiveError::Entry {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "duplicate entry name"),
            });
        }
        self.writer.start_file(name, self.options)?;
        self.names.insert(name.to_string());
        self.writer
            .write_all(data)
            .map_err(|source| ArchiveError::Entry {
                name: name.to_string(),
                source,
            })?;
        Ok(())
    }
}

/// Sink that keeps entries in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    /// First entry written under `name`
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntrySink for MemorySink {
    fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
        self.entries.push((name.to_string(), data.to_vec()));
        Ok(())
    }
}
