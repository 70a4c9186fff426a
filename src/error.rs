use crate::archive::ArchiveError;
use crate::remote::TransformError;
use std::io;
use thiserror::Error;

/// Why a single entry failed. Recorded in the error report; never aborts the
/// batch.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("entry has an empty name")]
    EmptyName,

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("compress failed: {0}")]
    Transform(#[from] TransformError),

    #[error("write failed: {0}")]
    Write(#[from] ArchiveError),

    /// The worker task ended without reporting.
    #[error("worker failed: {0}")]
    Worker(String),
}
