//! Compression pipeline.
//!
//! Fan-out over entries, fan-in to a single writer:
//!
//! # Architecture
//!
//! ```text
//! +------------+  spawn   +-----------+  channel(1)  +-------------+
//! | Dispatcher | -------> | Worker xC | -----------> |  Collector  | --> sink
//! | (semaphore)|          | (per entry)|             | (blocking)  |
//! +------------+          +-----------+              +-------------+
//!                              |
//!                       CacheStore (RwLock) + Compressor
//! ```
//!
//! Every entry produces exactly one [`EntryResult`]. The collector is the
//! only code that touches the output sink, so the sink needs no locking.

pub mod batch;
pub mod channel;
pub mod collector;
pub mod dispatcher;
pub mod filter;
pub mod inflight;
pub mod worker;

pub use batch::BatchCompressor;
pub use channel::{
    result_channel, BatchSummary, EntryResult, ErrorEntry, Outcome, PassReason, ResultReceiver,
    ResultSender, ERROR_REPORT_NAME, RESULT_CHANNEL_SIZE,
};
pub use collector::{render_report, CollectError, Collector};
pub use dispatcher::Dispatcher;
pub use filter::FilterPolicy;
pub use inflight::{InFlight, InFlightGuard};
pub use worker::{process_entry, WorkerContext};
