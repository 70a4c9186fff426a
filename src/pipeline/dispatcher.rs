//! Dispatcher task for the compression pipeline.
//!
//! Spawns one worker task per entry, in input order, with at most `limit`
//! running at once. Each task sends exactly one result to the collector.

use crate::archive::Entry;
use crate::error::EntryError;
use crate::pipeline::channel::{EntryResult, Outcome, ResultSender};
use crate::pipeline::worker::{process_entry, result_name, WorkerContext};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub struct Dispatcher {
    ctx: Arc<WorkerContext>,
    limit: usize,
}

impl Dispatcher {
    /// `limit` is clamped to at least 1.
    pub fn new(ctx: Arc<WorkerContext>, limit: usize) -> Self {
        Self {
            ctx,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Dispatch every entry and wait for the workers to finish.
    /// Returns how many entries were dispatched.
    pub async fn run(self, entries: Vec<Entry>, tx: ResultSender) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            // Waits here while `limit` workers are running
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Worker semaphore closed, stopping dispatch");
                    break;
                }
            };
            if tx.is_closed() {
                warn!("Result channel closed, stopping dispatch");
                break;
            }

            let ctx = self.ctx.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = run_worker(&ctx, entry).await;
                let (index, name) = (result.index, result.name.clone());
                if tx.send(result).await.is_err() {
                    warn!(index, name = %name, "Collector gone, result dropped");
                }
            }));
        }
        drop(tx);

        let dispatched = handles.len();
        debug!(dispatched, limit = self.limit, "All entries dispatched");

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task failed: {}", e);
            }
        }

        dispatched
    }
}

/// Run the worker, turning a panic into a failed result so the collector
/// still gets one result for the entry.
async fn run_worker(ctx: &WorkerContext, entry: Entry) -> EntryResult {
    let index = entry.index;
    let name = result_name(index, &entry.name);
    let is_dir = entry.is_dir;

    match AssertUnwindSafe(process_entry(ctx, entry)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(index, name = %name, "Worker panicked: {}", message);
            EntryResult::new(
                index,
                name,
                is_dir,
                Outcome::Failed(EntryError::Worker(message)),
            )
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
