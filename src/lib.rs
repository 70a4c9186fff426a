//! Batch-compress the images inside a zip archive through a remote
//! compression service.
//!
//! Each image is hashed, looked up in a persistent cache, and only sent to
//! the service on a miss. Results flow to a single collector that writes the
//! output archive and an error report for entries that failed.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod job;
pub mod pipeline;
pub mod remote;

pub use error::EntryError;
pub use hash::{Digest, HashingWriter};
pub use job::{run_job, JobConfig};
pub use pipeline::{BatchCompressor, BatchSummary};
