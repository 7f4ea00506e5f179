#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod job;
mod memory;
mod rag;
mod records;
mod store;

pub use error::{StoreError, StoreResult};
pub use job::{Job, JobStatus, NewJob};
pub use memory::MemoryStore;
pub use rag::{
    ComparisonVector, DriftFinding, NewRagTest, RagRunReport, RagRunStatus, RagSchedule, RagTest,
    RagTestRun, ScoreDelta,
};
pub use records::{
    Document, DocumentVector, NewDocument, NewDocumentVector, NewNotification, Notification,
    NotificationSymbol, Workspace, slugify,
};
pub use store::ShadowStore;

/// Tracing target for shadow store operations.
pub const TRACING_TARGET: &str = "vektra_model";
