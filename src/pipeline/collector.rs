//! Collector task for the compression pipeline.
//!
//! The only writer of the output sink. Receives one result per entry, writes
//! the payload of every successful non-directory result immediately, and
//! after the last result writes the error report if anything failed.

use crate::archive::{ArchiveError, EntrySink};
use crate::error::EntryError;
use crate::pipeline::channel::{
    BatchSummary, EntryResult, ErrorEntry, Outcome, PassReason, ResultReceiver,
    ERROR_REPORT_NAME,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pipeline bugs that abort the batch.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("result for entry {index} has an empty name")]
    EmptyName { index: usize },

    #[error("result channel closed after {received} of {expected} results")]
    ChannelClosed { received: usize, expected: usize },

    #[error("failed to write error report: {0}")]
    Report(#[source] ArchiveError),
}

pub struct Collector<S: EntrySink> {
    sink: S,
    expected: usize,
    errors: Vec<ErrorEntry>,
    summary: BatchSummary,
}

impl<S: EntrySink> Collector<S> {
    pub fn new(sink: S, expected: usize) -> Self {
        Self {
            sink,
            expected,
            errors: Vec::new(),
            summary: BatchSummary::new(),
        }
    }

    /// Drain `expected` results, then write the report.
    ///
    /// Blocks the calling thread; run it on the blocking pool.
    pub fn run(mut self, rx: &mut ResultReceiver) -> Result<(S, BatchSummary), CollectError> {
        while self.summary.total < self.expected {
            match rx.blocking_recv() {
                Some(result) => self.accept(result)?,
                None => {
                    return Err(CollectError::ChannelClosed {
                        received: self.summary.total,
                        expected: self.expected,
                    })
                }
            }
        }
        self.finish()
    }

    /// Account for one result, writing its payload if it has one.
    pub fn accept(&mut self, result: EntryResult) -> Result<(), CollectError> {
        if result.name.is_empty() {
            return Err(CollectError::EmptyName {
                index: result.index,
            });
        }
        self.summary.total += 1;

        let EntryResult {
            index,
            name,
            outcome,
            ..
        } = result;

        let data = match &outcome {
            Outcome::Directory => {
                self.summary.directories += 1;
                return Ok(());
            }
            Outcome::Failed(e) => {
                warn!(index, name = %name, "Entry failed: {}", e);
                self.record_error(index, name, e);
                return Ok(());
            }
            Outcome::Passthrough { data, .. }
            | Outcome::CacheHit { data, .. }
            | Outcome::Compressed { data, .. } => data,
        };

        if let Err(e) = self.sink.write_entry(&name, data) {
            let e = EntryError::Write(e);
            warn!(index, name = %name, "Entry failed: {}", e);
            self.record_error(index, name, &e);
            return Ok(());
        }

        self.summary.written += 1;
        match &outcome {
            Outcome::Passthrough {
                reason: PassReason::AlreadyCompressed,
                ..
            } => self.summary.already_compressed += 1,
            Outcome::Passthrough { .. } => self.summary.passthrough += 1,
            Outcome::CacheHit { data, source_len } => {
                self.summary.cache_hits += 1;
                self.summary.bytes_in += source_len;
                self.summary.bytes_out += data.len() as u64;
            }
            Outcome::Compressed {
                data, source_len, ..
            } => {
                self.summary.compressed += 1;
                self.summary.bytes_in += source_len;
                self.summary.bytes_out += data.len() as u64;
            }
            Outcome::Directory | Outcome::Failed(_) => {}
        }
        info!(index, name = %name, size = data.len(), "Entry written");

        Ok(())
    }

    /// Write the error report, if any, and hand back the sink.
    pub fn finish(mut self) -> Result<(S, BatchSummary), CollectError> {
        self.summary.failed = self.errors.len();

        if !self.errors.is_empty() {
            self.errors.sort_by_key(|e| e.index);
            let report = render_report(&self.errors);
            self.sink
                .write_entry(ERROR_REPORT_NAME, report.as_bytes())
                .map_err(CollectError::Report)?;
            self.summary.report_written = true;
            debug!(failed = self.summary.failed, "Error report written");
        }

        Ok((self.sink, self.summary))
    }

    fn record_error(&mut self, index: usize, name: String, error: &EntryError) {
        self.errors.push(ErrorEntry {
            index,
            name,
            error: error.to_string(),
        });
    }
}

/// One `(<index>) <name>: <error>` line per entry, in the given order.
pub fn render_report(errors: &[ErrorEntry]) -> String {
    let mut report = String::new();
    for e in errors {
        report.push_str(&format!("({}) {}: {}\n", e.index, e.name, e.error));
    }
    report
}
