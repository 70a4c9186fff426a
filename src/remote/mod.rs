//! Remote compression service.
//!
//! The pipeline only needs "bytes in, smaller bytes out"; [`Compressor`] is
//! that seam. [`TinifyClient`] talks to the tinypng shrink API.

mod client;

pub use client::{TinifyClient, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};

use crate::hash::Digest;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Output of a successful remote compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub data: Bytes,
    /// Digest of `data`
    pub digest: Digest,
}

impl Compressed {
    pub fn new(data: Bytes) -> Self {
        let digest = Digest::of(&data);
        Self { data, digest }
    }
}

/// Errors from a remote compression call. None of them are retried.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("can't compress because the API key is empty")]
    EmptyCredential,

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("can't compress an empty input")]
    EmptyInput,

    /// Transport failure or timeout
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("compression failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upload response has no Location header")]
    MissingLocation,

    #[error("invalid result location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("download of {url} failed with status {status}: {body}")]
    Download {
        url: String,
        status: u16,
        body: String,
    },
}

/// Something that compresses an image.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, input: Bytes) -> Result<Compressed, TransformError>;
}
