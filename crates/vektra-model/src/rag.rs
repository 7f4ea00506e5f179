//! RAG drift tests: stored baselines and timestamped runs.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a RAG test is replayed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RagSchedule {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

/// One baseline neighbor captured when the test was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonVector {
    pub vector_id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A stored similarity query with its baseline result set.
///
/// The baseline is captured once from a live search and never mutated by
/// runs; each run records its own divergence report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagTest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub workspace_id: Uuid,
    pub query_text: Option<String>,
    pub query_vector: Vec<f32>,
    pub top_k: usize,
    pub schedule: RagSchedule,
    pub comparisons: Vec<ComparisonVector>,
    pub enabled: bool,
    pub last_run: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Input for creating a RAG test.
#[derive(Debug, Clone)]
pub struct NewRagTest {
    pub organization_id: Uuid,
    pub workspace_id: Uuid,
    pub query_text: Option<String>,
    pub query_vector: Vec<f32>,
    pub top_k: usize,
    pub schedule: RagSchedule,
    pub comparisons: Vec<ComparisonVector>,
}

/// Terminal status of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RagRunStatus {
    Running,
    Complete,
    /// Ran cleanly but flagged drift.
    #[serde(rename = "deviation_alert")]
    #[strum(serialize = "deviation_alert")]
    Alert,
    Failed,
}

/// One divergence observation referencing a vector id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftFinding {
    pub vector_id: String,
    pub message: String,
}

/// Score movement for one baseline vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub base_score: f32,
    pub new_score: Option<f32>,
    pub delta_score: Option<f32>,
}

/// Structured result payload of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagRunReport {
    #[serde(default)]
    pub error_log: Vec<DriftFinding>,
    #[serde(default)]
    pub score_map: BTreeMap<String, ScoreDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RagRunReport {
    /// A report carrying only a human-readable message (failed runs).
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A timestamped execution of a RAG test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagTestRun {
    pub id: Uuid,
    pub rag_test_id: Uuid,
    pub organization_id: Uuid,
    pub workspace_id: Uuid,
    pub status: RagRunStatus,
    pub results: RagRunReport,
    pub created_at: Timestamp,
}
