//! One end-to-end run: input archive in, output archive out.

use crate::archive::{ZipSink, ZipSource};
use crate::cache::{CacheStore, FjallCache};
use crate::config::Config;
use crate::pipeline::{BatchCompressor, BatchSummary, FilterPolicy};
use crate::remote::TinifyClient;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed for one run
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Input zip archive
    pub input: PathBuf,
    /// Output zip archive, created or truncated
    pub output: PathBuf,
    /// Cache keyspace directory
    pub cache_path: PathBuf,
    /// Remote service credential
    pub key: String,
    pub config: Config,
}

/// Run a job. Startup failures (input, cache, output, credential) return an
/// error before any entry is processed; per-entry failures only show up in
/// the summary and the error report.
pub async fn run_job(job: JobConfig) -> Result<BatchSummary> {
    job.config.validate()?;

    let source = ZipSource::open(&job.input)
        .with_context(|| format!("Failed to open input archive {}", job.input.display()))?;
    let entries = source.entries().context("Failed to index input archive")?;
    debug!(entries = entries.len(), input = %job.input.display(), "Input archive opened");

    let cache = FjallCache::open(&job.cache_path)
        .with_context(|| format!("Failed to open cache {}", job.cache_path.display()))?;
    let cache = Arc::new(CacheStore::new(cache));

    let compressor = TinifyClient::new(job.key.as_str(), &job.config.endpoint, job.config.timeout())
        .context("Failed to set up compression client")?;

    let sink = ZipSink::create(&job.output)
        .with_context(|| format!("Failed to create output archive {}", job.output.display()))?;

    let batch = BatchCompressor::new(
        cache,
        Arc::new(compressor),
        FilterPolicy::from_config(&job.config),
        job.config.concurrency,
    );
    let (sink, summary) = batch.run(entries, sink).await?;

    let output = job.output.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = sink.finish()?;
        file.sync_all()?;
        Ok(())
    })
    .await?
    .with_context(|| format!("Failed to finish output archive {}", output.display()))?;

    info!(
        output = %job.output.display(),
        written = summary.written,
        compressed = summary.compressed,
        cache_hits = summary.cache_hits,
        already_compressed = summary.already_compressed,
        passthrough = summary.passthrough,
        failed = summary.failed,
        bytes_saved = summary.bytes_saved(),
        "Done"
    );

    Ok(summary)
}
