//! RAG drift detection: replay stored queries against their baselines.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use vektra_connector::{SimilaritySearch, VectorConnector};
use vektra_model::{
    ComparisonVector, DriftFinding, NewNotification, NotificationSymbol, RagRunReport,
    RagRunStatus, RagTest, RagTestRun, ScoreDelta, ShadowStore,
};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};

/// Score movement below this is considered noise.
pub const DEFAULT_DRIFT_THRESHOLD: f32 = 0.30;

/// Drift detection tuning.
#[derive(Debug, Clone, Copy)]
pub struct DriftConfig {
    /// Absolute score delta at which a matched vector counts as drifted.
    /// The boundary itself is a divergence.
    pub threshold: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }
}

/// Replays RAG tests and records divergence runs.
pub struct DriftDetector {
    store: Arc<dyn ShadowStore>,
    config: DriftConfig,
}

impl DriftDetector {
    /// Creates a detector with the default threshold.
    pub fn new(store: Arc<dyn ShadowStore>) -> Self {
        Self::with_config(store, DriftConfig::default())
    }

    /// Creates a detector with explicit tuning.
    pub fn with_config(store: Arc<dyn ShadowStore>, config: DriftConfig) -> Self {
        Self { store, config }
    }

    /// Runs one test: replays the stored query, diffs against the baseline
    /// and records a timestamped run.
    ///
    /// The baseline on the test is never mutated. Any divergence yields an
    /// Alert run plus an operator notification; a connector failure yields
    /// a Failed run carrying the message.
    pub async fn run(
        &self,
        connector: &dyn VectorConnector,
        test: &RagTest,
    ) -> EngineResult<RagTestRun> {
        let workspace = self
            .store
            .workspace(test.workspace_id)
            .await?
            .ok_or(EngineError::WorkspaceNotFound(test.workspace_id))?;

        let run = self
            .store
            .create_rag_test_run(test.id, RagRunStatus::Running, RagRunReport::default())
            .await?;

        let search = match connector
            .similarity_search(&workspace.name, &test.query_vector, test.top_k)
            .await
        {
            Ok(search) => search,
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    test = %test.id,
                    error = %err,
                    "RAG test replay failed"
                );
                let failed = self
                    .store
                    .update_rag_test_run(
                        run.id,
                        RagRunStatus::Failed,
                        RagRunReport::message_only(err.to_string()),
                    )
                    .await?;
                self.store.touch_rag_test(test.id).await?;
                return Ok(failed);
            }
        };

        let report = diff_against_baseline(&test.comparisons, &search, self.config.threshold);
        let status = if report.error_log.is_empty() {
            RagRunStatus::Complete
        } else {
            RagRunStatus::Alert
        };

        let finished = self
            .store
            .update_rag_test_run(run.id, status, report)
            .await?;

        if status == RagRunStatus::Alert {
            tracing::warn!(
                target: TRACING_TARGET,
                test = %test.id,
                workspace = %workspace.slug,
                findings = finished.results.error_log.len(),
                "RAG test drifted from its baseline"
            );
            self.store
                .create_notification(NewNotification {
                    organization_id: test.organization_id,
                    text_content: format!(
                        "RAG test results for workspace `{}` deviated from the baseline",
                        workspace.name
                    ),
                    symbol: NotificationSymbol::Warning,
                    link: None,
                })
                .await?;
        }

        self.store.touch_rag_test(test.id).await?;
        Ok(finished)
    }
}

/// Diffs a replayed result set against the stored baseline.
///
/// Three divergence classes: ids newly present, baseline ids now missing,
/// and matched ids whose absolute score delta reaches the threshold.
fn diff_against_baseline(
    baseline: &[ComparisonVector],
    search: &SimilaritySearch,
    threshold: f32,
) -> RagRunReport {
    let mut report = RagRunReport::default();

    let current: HashMap<&str, f32> = search
        .vector_ids
        .iter()
        .map(String::as_str)
        .zip(search.scores.iter().copied())
        .collect();
    let known: HashSet<&str> = baseline.iter().map(|c| c.vector_id.as_str()).collect();

    for id in &search.vector_ids {
        if !known.contains(id.as_str()) {
            report.error_log.push(DriftFinding {
                vector_id: id.clone(),
                message: format!("vector {id} was not part of the baseline result set"),
            });
        }
    }

    for comparison in baseline {
        let id = comparison.vector_id.as_str();
        match current.get(id) {
            Some(&new_score) => {
                let delta = new_score - comparison.score;
                report.score_map.insert(
                    comparison.vector_id.clone(),
                    ScoreDelta {
                        base_score: comparison.score,
                        new_score: Some(new_score),
                        delta_score: Some(delta),
                    },
                );
                if delta.abs() >= threshold {
                    report.error_log.push(DriftFinding {
                        vector_id: comparison.vector_id.clone(),
                        message: format!(
                            "vector {id} score moved by {delta:.4} (baseline {:.4}, now {:.4})",
                            comparison.score, new_score
                        ),
                    });
                }
            }
            None => {
                report.score_map.insert(
                    comparison.vector_id.clone(),
                    ScoreDelta {
                        base_score: comparison.score,
                        new_score: None,
                        delta_score: None,
                    },
                );
                report.error_log.push(DriftFinding {
                    vector_id: comparison.vector_id.clone(),
                    message: format!("vector {id} is missing from the current results"),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(entries: &[(&str, f32)]) -> Vec<ComparisonVector> {
        entries
            .iter()
            .map(|(id, score)| ComparisonVector {
                vector_id: (*id).to_string(),
                score: *score,
                metadata: serde_json::json!({}),
            })
            .collect()
    }

    fn search(entries: &[(&str, f32)]) -> SimilaritySearch {
        SimilaritySearch {
            vector_ids: entries.iter().map(|(id, _)| (*id).to_string()).collect(),
            context_texts: vec![String::new(); entries.len()],
            source_documents: vec![serde_json::json!({}); entries.len()],
            scores: entries.iter().map(|(_, s)| *s).collect(),
        }
    }

    #[test]
    fn large_score_movement_is_flagged() {
        let report = diff_against_baseline(
            &baseline(&[("v1", 0.90)]),
            &search(&[("v1", 0.55)]),
            DEFAULT_DRIFT_THRESHOLD,
        );

        assert_eq!(report.error_log.len(), 1);
        assert_eq!(report.error_log[0].vector_id, "v1");

        let delta = report.score_map["v1"];
        assert_eq!(delta.base_score, 0.90);
        assert_eq!(delta.new_score, Some(0.55));
    }

    #[test]
    fn small_score_movement_is_noise() {
        let report = diff_against_baseline(
            &baseline(&[("v1", 0.90)]),
            &search(&[("v1", 0.80)]),
            DEFAULT_DRIFT_THRESHOLD,
        );

        assert!(report.error_log.is_empty());
        let delta = report.score_map["v1"].delta_score.unwrap();
        assert!((delta + 0.10).abs() < 1e-6);
    }

    #[test]
    fn the_threshold_boundary_counts_as_drift() {
        let report = diff_against_baseline(
            &baseline(&[("v1", 0.75)]),
            &search(&[("v1", 0.45)]),
            0.30,
        );
        assert_eq!(report.error_log.len(), 1);
    }

    #[test]
    fn new_and_missing_vectors_are_both_flagged() {
        let report = diff_against_baseline(
            &baseline(&[("v1", 0.9), ("v2", 0.8)]),
            &search(&[("v1", 0.9), ("v9", 0.7)]),
            DEFAULT_DRIFT_THRESHOLD,
        );

        let messages: Vec<&str> = report
            .error_log
            .iter()
            .map(|f| f.vector_id.as_str())
            .collect();
        assert!(messages.contains(&"v9"));
        assert!(messages.contains(&"v2"));
        assert_eq!(report.error_log.len(), 2);

        assert!(report.score_map["v2"].new_score.is_none());
    }
}
