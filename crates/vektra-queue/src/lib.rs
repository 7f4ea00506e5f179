#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod handler;
mod queue;
mod registry;

pub use error::{QueueError, QueueResult};
pub use handler::{JobContext, JobHandler, JobOutcome};
pub use queue::{JobQueue, JobWorker};
pub use registry::HandlerRegistry;

/// Tracing target for queue operations.
pub const TRACING_TARGET: &str = "vektra_queue";
