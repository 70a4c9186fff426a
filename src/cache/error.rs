//! Cache store error types.

use thiserror::Error;

/// Errors that can occur while reading or writing the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Storage engine error.
    #[error("cache storage error: {0}")]
    Storage(#[from] fjall::Error),

    /// Backend refused the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("corrupt cache row for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
