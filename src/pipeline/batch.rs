//! Batch orchestration.
//!
//! Wires dispatcher, workers and collector together for one run.

use crate::archive::{Entry, EntrySink};
use crate::cache::CacheStore;
use crate::pipeline::channel::{result_channel, BatchSummary};
use crate::pipeline::collector::Collector;
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::filter::FilterPolicy;
use crate::pipeline::worker::WorkerContext;
use crate::remote::Compressor;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Orchestrator for one compression batch
pub struct BatchCompressor {
    ctx: Arc<WorkerContext>,
    concurrency: usize,
}

impl BatchCompressor {
    pub fn new(
        cache: Arc<CacheStore>,
        compressor: Arc<dyn Compressor>,
        policy: FilterPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext::new(cache, compressor, policy)),
            concurrency: concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.ctx.cache
    }

    /// Process every entry into `sink`. Returns the sink and the batch summary.
    ///
    /// Per-entry failures end up in the summary and the error report; only
    /// pipeline bugs return an error.
    pub async fn run<S>(&self, entries: Vec<Entry>, sink: S) -> Result<(S, BatchSummary)>
    where
        S: EntrySink + Send + 'static,
    {
        let start = Instant::now();
        let expected = entries.len();
        let (tx, mut rx) = result_channel();

        // 1. Collector on its own blocking thread
        let collector = Collector::new(sink, expected);
        let collect_handle = tokio::task::spawn_blocking(move || collector.run(&mut rx));

        // 2. Dispatch; returns once every worker has reported
        let dispatcher = Dispatcher::new(self.ctx.clone(), self.concurrency);
        let dispatched = dispatcher.run(entries, tx).await;

        // 3. Collector finishes after the last result
        let (sink, summary) = collect_handle
            .await
            .context("Collector task failed")?
            .context("Collector failed")?;

        info!(
            entries = expected,
            dispatched,
            written = summary.written,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok((sink, summary))
    }
}
