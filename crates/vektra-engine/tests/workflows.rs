//! End-to-end engine workflow tests over in-memory stores and connectors.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vektra_cache::VectorCache;
use vektra_connector::{ConnectorKind, SimilaritySearch, VectorChunk};
use vektra_engine::{
    CloneEngine, DriftDetector, IngestPipeline, JobClient, Maintenance, SyncEngine,
};
use vektra_model::{
    ComparisonVector, MemoryStore, NewRagTest, RagRunStatus, RagSchedule, ShadowStore,
};
use vektra_queue::{HandlerRegistry, JobQueue};

use crate::common::{FakeConnector, FakeEmbedder};

fn chunk(id: &str, title: &str, text: &str) -> VectorChunk {
    VectorChunk::new(
        id,
        vec![0.1, 0.2, 0.3, 0.4],
        serde_json::json!({ "title": title, "text": text }),
    )
}

struct Fixture {
    store: Arc<MemoryStore>,
    cache: VectorCache,
    connector: FakeConnector,
    organization_id: Uuid,
}

impl Fixture {
    fn new(kind: ConnectorKind) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            cache: VectorCache::with_memory().unwrap(),
            connector: FakeConnector::new(kind),
            organization_id: Uuid::new_v4(),
        }
    }

    fn ingest(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.store.clone(),
            self.cache.clone(),
            Arc::new(FakeEmbedder),
        )
    }

    fn sync(&self) -> SyncEngine {
        SyncEngine::new(self.store.clone(), self.cache.clone())
    }

    fn clone_engine(&self) -> CloneEngine {
        CloneEngine::new(self.store.clone(), self.cache.clone())
    }

    fn maintenance(&self) -> Maintenance {
        Maintenance::new(self.store.clone(), self.cache.clone())
    }
}

#[tokio::test]
async fn re_ingesting_a_document_is_a_no_op() {
    let fx = Fixture::new(ConnectorKind::Qdrant);
    let workspace = fx
        .store
        .create_workspace(fx.organization_id, "docs")
        .await
        .unwrap();

    let text = "alpha beta gamma. ".repeat(120);
    let first = fx
        .ingest()
        .add_document(&fx.connector, &workspace, "doc-A", &text)
        .await
        .unwrap();
    assert!(!first.skipped);
    assert!(first.chunks > 0);

    let second = fx
        .ingest()
        .add_document(&fx.connector, &workspace, "doc-A", &text)
        .await
        .unwrap();
    assert!(second.skipped);
    assert_eq!(second.document.id, first.document.id);

    // No duplicate vectors anywhere: remote, shadow rows, or cache.
    assert_eq!(fx.connector.vectors_in("docs").len(), first.chunks);
    let rows = fx
        .store
        .vectors_for_document(first.document.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), first.chunks);
    assert_eq!(
        fx.cache.get(workspace.id, "doc-A").await.unwrap().len(),
        first.chunks
    );
}

#[tokio::test]
async fn sync_regroups_a_flat_namespace_into_documents() {
    let fx = Fixture::new(ConnectorKind::Chroma);
    // Page size 2 forces three raw pages for five points.
    fx.connector.seed(
        "kb",
        vec![
            chunk("p1", "a.txt", "line one"),
            chunk("p2", "b.txt", "intro"),
            chunk("p3", "a.txt", "line two"),
            chunk("p4", "a.txt", "line three"),
            chunk("p5", "b.txt", "outro"),
        ],
    );

    let report = fx
        .sync()
        .sync_all(&fx.connector, fx.organization_id)
        .await
        .unwrap();
    assert_eq!(report.workspaces, 1);
    assert_eq!(report.documents, 2);
    assert_eq!(report.vectors, 5);
    assert!(report.failed_to_sync.is_empty());

    let workspace = fx
        .store
        .workspace_by_slug(fx.organization_id, "kb")
        .await
        .unwrap()
        .unwrap();
    let documents = fx
        .store
        .documents_in_workspace(workspace.id)
        .await
        .unwrap();
    assert_eq!(documents.len(), 2);

    let a = documents.iter().find(|d| d.name == "a.txt").unwrap();
    let b = documents.iter().find(|d| d.name == "b.txt").unwrap();
    assert_eq!(fx.store.vectors_for_document(a.id).await.unwrap().len(), 3);
    assert_eq!(fx.store.vectors_for_document(b.id).await.unwrap().len(), 2);

    // One cache file per regrouped document.
    assert_eq!(fx.cache.get(workspace.id, "a.txt").await.unwrap().len(), 3);
    assert_eq!(fx.cache.get(workspace.id, "b.txt").await.unwrap().len(), 2);
}

#[tokio::test]
async fn a_failing_namespace_does_not_abort_the_sync() {
    let fx = Fixture::new(ConnectorKind::Weaviate);
    fx.connector
        .seed("good", vec![chunk("p1", "a.txt", "fine")]);
    fx.connector.seed("bad", vec![chunk("p2", "b.txt", "nope")]);
    fx.connector.fail_namespace("bad");

    let report = fx
        .sync()
        .sync_all(&fx.connector, fx.organization_id)
        .await
        .unwrap();

    assert_eq!(report.workspaces, 2);
    assert_eq!(report.documents, 1);
    assert_eq!(report.failed_to_sync.len(), 1);
    assert_eq!(report.failed_to_sync[0].namespace, "bad");
}

#[tokio::test]
async fn cloning_preserves_payloads_under_fresh_vector_ids() {
    let fx = Fixture::new(ConnectorKind::Qdrant);
    let source = fx
        .store
        .create_workspace(fx.organization_id, "source")
        .await
        .unwrap();

    let text = "clone me. ".repeat(150);
    let ingested = fx
        .ingest()
        .add_document(&fx.connector, &source, "doc-A", &text)
        .await
        .unwrap();

    let report = fx
        .clone_engine()
        .clone_workspace(&fx.connector, &source, fx.organization_id, "copy")
        .await
        .unwrap();
    assert_eq!(report.cloned, 1);
    assert!(report.skipped.is_empty());

    let source_entries = fx.cache.get(source.id, "doc-A").await.unwrap();
    let copy_entries = fx.cache.get(report.workspace.id, "doc-A").await.unwrap();
    assert_eq!(copy_entries.len(), source_entries.len());

    for (original, copied) in source_entries.iter().zip(&copy_entries) {
        assert_eq!(copied.values, original.values);
        assert_eq!(copied.metadata, original.metadata);
        assert_ne!(copied.vector_db_id, original.vector_db_id);
    }

    // The copy is correlated under its own doc id.
    let copies = fx
        .store
        .documents_in_workspace(report.workspace.id)
        .await
        .unwrap();
    assert_eq!(copies.len(), 1);
    assert_ne!(copies[0].doc_id, ingested.document.doc_id);
    assert_eq!(
        fx.connector.vectors_in("copy").len(),
        source_entries.len()
    );
}

#[tokio::test]
async fn uncached_documents_are_skipped_by_workspace_clones() {
    let fx = Fixture::new(ConnectorKind::Chroma);
    let source = fx
        .store
        .create_workspace(fx.organization_id, "source")
        .await
        .unwrap();

    let text = "cached text. ".repeat(100);
    fx.ingest()
        .add_document(&fx.connector, &source, "cached.txt", &text)
        .await
        .unwrap();
    // A document row with no cache file behind it.
    fx.store
        .create_document(vektra_model::NewDocument::new(
            source.id,
            fx.organization_id,
            "uncached.txt",
        ))
        .await
        .unwrap();

    let report = fx
        .clone_engine()
        .clone_workspace(&fx.connector, &source, fx.organization_id, "copy")
        .await
        .unwrap();

    assert_eq!(report.cloned, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "uncached.txt");
}

#[tokio::test]
async fn migration_clones_workspaces_onto_the_destination_org() {
    let fx = Fixture::new(ConnectorKind::Weaviate);
    let source = fx
        .store
        .create_workspace(fx.organization_id, "kb")
        .await
        .unwrap();
    let text = "migrate me. ".repeat(100);
    fx.ingest()
        .add_document(&fx.connector, &source, "doc-A", &text)
        .await
        .unwrap();

    let dest_org = Uuid::new_v4();
    let report = fx
        .clone_engine()
        .migrate_organization(&fx.connector, fx.organization_id, dest_org)
        .await
        .unwrap();

    assert_eq!(report.workspaces, 1);
    assert_eq!(report.documents, 1);
    assert!(report.skipped_workspaces.is_empty());

    let migrated = fx
        .store
        .workspaces_for_organization(dest_org)
        .await
        .unwrap();
    assert_eq!(migrated.len(), 1);
    assert_eq!(migrated[0].name, "kb");
}

#[tokio::test]
async fn starter_tier_destinations_skip_every_namespace() {
    let fx = Fixture::new(ConnectorKind::Pinecone);
    fx.store
        .create_workspace(fx.organization_id, "kb")
        .await
        .unwrap();

    let starter = FakeConnector::without_namespace_support(ConnectorKind::Pinecone);
    let report = fx
        .clone_engine()
        .migrate_organization(&starter, fx.organization_id, Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(report.workspaces, 0);
    assert_eq!(report.skipped_workspaces.len(), 1);
}

#[tokio::test]
async fn drift_beyond_the_threshold_raises_an_alert() {
    let fx = Fixture::new(ConnectorKind::Qdrant);
    let workspace = fx
        .store
        .create_workspace(fx.organization_id, "kb")
        .await
        .unwrap();

    let test = fx
        .store
        .create_rag_test(NewRagTest {
            organization_id: fx.organization_id,
            workspace_id: workspace.id,
            query_text: Some("what is drift".into()),
            query_vector: vec![0.1, 0.2, 0.3, 0.4],
            top_k: 1,
            schedule: RagSchedule::Daily,
            comparisons: vec![ComparisonVector {
                vector_id: "v1".into(),
                score: 0.75,
                metadata: serde_json::json!({}),
            }],
        })
        .await
        .unwrap();

    fx.connector.set_search(SimilaritySearch {
        vector_ids: vec!["v1".into()],
        context_texts: vec!["ctx".into()],
        source_documents: vec![serde_json::json!({})],
        scores: vec![0.40],
    });

    let detector = DriftDetector::new(fx.store.clone());
    let run = detector.run(&fx.connector, &test).await.unwrap();

    assert_eq!(run.status, RagRunStatus::Alert);
    assert_eq!(run.results.error_log.len(), 1);
    assert_eq!(run.results.error_log[0].vector_id, "v1");

    // An alert notifies the operator and stamps the test.
    let notifications = fx
        .store
        .notifications_for_organization(fx.organization_id)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    let touched = fx.store.rag_test(test.id).await.unwrap().unwrap();
    assert!(touched.last_run.is_some());
    // The baseline itself never moves.
    assert_eq!(touched.comparisons[0].score, 0.75);
}

#[tokio::test]
async fn small_drift_completes_without_alerting() {
    let fx = Fixture::new(ConnectorKind::Qdrant);
    let workspace = fx
        .store
        .create_workspace(fx.organization_id, "kb")
        .await
        .unwrap();

    let test = fx
        .store
        .create_rag_test(NewRagTest {
            organization_id: fx.organization_id,
            workspace_id: workspace.id,
            query_text: None,
            query_vector: vec![0.5; 4],
            top_k: 1,
            schedule: RagSchedule::Hourly,
            comparisons: vec![ComparisonVector {
                vector_id: "v1".into(),
                score: 0.75,
                metadata: serde_json::json!({}),
            }],
        })
        .await
        .unwrap();

    fx.connector.set_search(SimilaritySearch {
        vector_ids: vec!["v1".into()],
        context_texts: vec!["ctx".into()],
        source_documents: vec![serde_json::json!({})],
        scores: vec![0.65],
    });

    let run = DriftDetector::new(fx.store.clone())
        .run(&fx.connector, &test)
        .await
        .unwrap();

    assert_eq!(run.status, RagRunStatus::Complete);
    assert!(run.results.error_log.is_empty());
    assert!(
        fx.store
            .notifications_for_organization(fx.organization_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn workspace_clone_jobs_are_refused_on_starter_tiers() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (queue, worker) = JobQueue::new(
        store.clone(),
        Arc::new(HandlerRegistry::new()),
        cancel.clone(),
    );
    worker.spawn();

    let client = JobClient::new(queue);
    let starter = FakeConnector::without_namespace_support(ConnectorKind::Pinecone);
    let organization_id = Uuid::new_v4();

    let submission = client
        .clone_workspace(&starter, organization_id, Uuid::new_v4(), "copy")
        .await
        .unwrap();

    assert!(submission.job.is_none());
    assert!(submission.error.is_some());
    // Nothing was enqueued.
    assert!(
        store
            .jobs_for_organization(organization_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn deleting_a_document_clears_remote_shadow_and_cache() {
    let fx = Fixture::new(ConnectorKind::Qdrant);
    let workspace = fx
        .store
        .create_workspace(fx.organization_id, "docs")
        .await
        .unwrap();

    let text = "delete me. ".repeat(100);
    let ingested = fx
        .ingest()
        .add_document(&fx.connector, &workspace, "doc-A", &text)
        .await
        .unwrap();
    assert!(!fx.connector.vectors_in("docs").is_empty());

    fx.maintenance()
        .delete_document(&fx.connector, &workspace, ingested.document.id)
        .await
        .unwrap();

    assert!(fx.connector.vectors_in("docs").is_empty());
    assert!(
        fx.store
            .document(ingested.document.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(!fx.cache.exists(workspace.id, "doc-A").await.unwrap());
}
