//! Archive input and output.
//!
//! The pipeline sees entries through [`Entry`] / [`EntryPayload`] and writes
//! through [`EntrySink`]; the zip container lives behind those.

mod sink;
mod source;

pub use sink::{EntrySink, MemorySink, ZipSink};
pub use source::{Entry, EntryMeta, EntryPayload, ZipSource};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write entry {name}: {source}")]
    Entry {
        name: String,
        source: std::io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
