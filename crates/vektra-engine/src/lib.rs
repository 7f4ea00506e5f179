#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod clone;
mod drift;
mod error;
mod handlers;
mod ingest;
mod jobs;
mod maintain;
mod sync;

pub use clone::{CloneEngine, CloneReport, MigrateReport, SkippedDocument, SkippedWorkspace};
pub use drift::{DEFAULT_DRIFT_THRESHOLD, DriftConfig, DriftDetector};
pub use error::{EngineError, EngineResult};
pub use handlers::{ConfigResolver, ConnectorResolver, EngineContext, register_handlers};
pub use ingest::{IngestPipeline, IngestReport};
pub use jobs::{JobClient, JobSubmission, verbs};
pub use maintain::{Maintenance, ResetReport};
pub use sync::{FailedNamespace, SyncEngine, SyncReport};

/// Tracing target for engine workflows.
pub const TRACING_TARGET: &str = "vektra_engine";
