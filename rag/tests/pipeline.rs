mod common;

use common::{chunks, record, FakeEmbedder, FlakyIndex, MissingIndex};
use std::sync::Arc;
use study_rag::{
    DocumentProcessor, ExistingIdStrategy, InMemoryIndex, IndexReconciler, IngestService, PageText, RagError,
    ReconcileOptions, Stage, TextSplitter, VectorIndex,
};

const DIM: usize = 4;

fn reconciler(index: Arc<dyn VectorIndex>, embedder: Arc<FakeEmbedder>, options: ReconcileOptions) -> IndexReconciler {
    IndexReconciler::new(index, embedder, options)
}

fn sample() -> Vec<study_rag::Chunk> {
    chunks(
        "lecture.pdf",
        &[
            (0, "Cells are the basic unit of life."),
            (0, "Mitochondria produce ATP."),
            (1, "Ribosomes build proteins."),
        ],
    )
}

#[tokio::test]
async fn second_reconcile_adds_nothing() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index.clone(), embedder.clone(), ReconcileOptions::default());

    assert_eq!(reconciler.reconcile(&sample()).await.unwrap(), 3);
    assert_eq!(index.len().await, 3);
    let calls_after_first = embedder.calls();

    assert_eq!(reconciler.reconcile(&sample()).await.unwrap(), 0);
    assert_eq!(index.len().await, 3);
    assert_eq!(embedder.calls(), calls_after_first);
}

#[tokio::test]
async fn only_missing_chunks_are_embedded() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index.clone(), embedder.clone(), ReconcileOptions::default());

    let all = sample();
    reconciler.reconcile(&all[..2]).await.unwrap();
    assert_eq!(embedder.texts(), 2);

    assert_eq!(reconciler.reconcile(&all).await.unwrap(), 1);
    assert_eq!(embedder.texts(), 3);
    assert_eq!(index.len().await, 3);
}

#[tokio::test]
async fn broad_query_finds_existing_ids_without_listing() {
    let index = Arc::new(InMemoryIndex::new("test", DIM).without_listing());
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index.clone(), embedder.clone(), ReconcileOptions::default());

    assert_eq!(reconciler.reconcile(&sample()).await.unwrap(), 3);
    assert_eq!(reconciler.reconcile(&sample()).await.unwrap(), 0);
    assert_eq!(embedder.texts(), 3);
}

#[tokio::test]
async fn listing_strategy_requires_listing_support() {
    let index = Arc::new(InMemoryIndex::new("test", DIM).without_listing());
    let options = ReconcileOptions {
        strategy: ExistingIdStrategy::Listing,
        ..ReconcileOptions::default()
    };
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index.clone(), embedder.clone(), options);

    let err = reconciler.reconcile(&sample()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::IndexLookup));
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn batches_are_bounded() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM);
    let options = ReconcileOptions {
        batch_size: 2,
        ..ReconcileOptions::default()
    };
    let reconciler = reconciler(index.clone(), embedder.clone(), options);

    let pages: Vec<(usize, &str)> = (0..5).map(|page| (page, "same text")).collect();
    assert_eq!(reconciler.reconcile(&chunks("big.pdf", &pages)).await.unwrap(), 5);
    assert_eq!(embedder.calls(), 3);
    assert_eq!(index.len().await, 5);
}

#[tokio::test]
async fn failed_batch_keeps_earlier_writes_and_rerun_fills_the_gap() {
    let index = FlakyIndex::new(DIM, 2);
    let embedder = FakeEmbedder::hashed(DIM);
    let options = ReconcileOptions {
        batch_size: 2,
        ..ReconcileOptions::default()
    };
    let reconciler = reconciler(index.clone(), embedder.clone(), options);

    let pages: Vec<(usize, &str)> = (0..5).map(|page| (page, "page text")).collect();
    let all = chunks("flaky.pdf", &pages);

    let err = reconciler.reconcile(&all).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Upsert));
    assert_eq!(index.inner.len().await, 2);
    assert_eq!(embedder.texts(), 5);

    assert_eq!(reconciler.reconcile(&all).await.unwrap(), 3);
    assert_eq!(index.inner.len().await, 5);
    assert_eq!(embedder.texts(), 8);
}

#[tokio::test]
async fn repeated_ids_in_one_batch_are_written_once() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index.clone(), embedder.clone(), ReconcileOptions::default());

    let mut batch = sample();
    batch.push(batch[0].clone());

    assert_eq!(reconciler.reconcile(&batch).await.unwrap(), 3);
    assert_eq!(embedder.texts(), 3);
}

#[tokio::test]
async fn embedding_failure_writes_nothing() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::failing(DIM);
    let reconciler = reconciler(index.clone(), embedder, ReconcileOptions::default());

    let err = reconciler.reconcile(&sample()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Embedding));
    assert!(err.to_string().starts_with("embedding failed"));
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn dimension_mismatch_is_an_embedding_error() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM + 1);
    let reconciler = reconciler(index.clone(), embedder.clone(), ReconcileOptions::default());

    let err = reconciler.reconcile(&sample()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Embedding));
    assert!(err.to_string().contains("dimension mismatch"));
    assert_eq!(embedder.calls(), 0);
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn unidentified_chunks_are_rejected_before_any_call() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let embedder = FakeEmbedder::hashed(DIM);
    let reconciler = reconciler(index, embedder.clone(), ReconcileOptions::default());

    let raw = vec![study_rag::Chunk::new("no id yet", "a.pdf", 0)];
    let err = reconciler.reconcile(&raw).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn clearing_a_missing_index_is_a_no_op() {
    let reconciler = reconciler(Arc::new(MissingIndex), FakeEmbedder::hashed(DIM), ReconcileOptions::default());
    reconciler.clear().await.unwrap();
}

#[tokio::test]
async fn reconciling_against_a_missing_index_fails_at_lookup() {
    let reconciler = reconciler(Arc::new(MissingIndex), FakeEmbedder::hashed(DIM), ReconcileOptions::default());
    let err = reconciler.reconcile(&sample()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::IndexLookup));
}

fn ingest_service(index: Arc<InMemoryIndex>, embedder: Arc<FakeEmbedder>) -> IngestService {
    let processor = DocumentProcessor::new(TextSplitter::new(40, 5).unwrap());
    let reconciler = IndexReconciler::new(index, embedder, ReconcileOptions::default());
    IngestService::new(processor, reconciler)
}

#[tokio::test]
async fn ingesting_pages_twice_is_idempotent() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let service = ingest_service(index.clone(), FakeEmbedder::hashed(DIM));

    let pages = vec![
        PageText {
            source: "notes.pdf".into(),
            page: 0,
            text: "Photosynthesis turns light into chemical energy.\n\nIt happens in chloroplasts.".into(),
        },
        PageText {
            source: "notes.pdf".into(),
            page: 1,
            text: "Respiration releases that energy.".into(),
        },
    ];

    let first = service.ingest_pages(pages.clone()).await.unwrap();
    assert!(first.chunks >= 3);
    assert_eq!(first.added, first.chunks);

    let second = service.ingest_pages(pages).await.unwrap();
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(second.added, 0);
    assert_eq!(index.len().await, first.chunks);

    let ids = index.list_ids().await.unwrap().unwrap();
    assert!(ids.contains("notes.pdf:0:0"));
    assert!(ids.contains("notes.pdf:1:0"));
}

#[tokio::test]
async fn missing_data_directory_is_not_found() {
    let service = ingest_service(Arc::new(InMemoryIndex::new("test", DIM)), FakeEmbedder::hashed(DIM));
    let err = service
        .ingest_directory(std::path::Path::new("/definitely/not/here"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
    assert!(err.to_string().contains("only works in local development"));
}

#[tokio::test]
async fn reset_clears_before_ingesting_directory() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    index
        .upsert(vec![record("stale:0:0", "old content", vec![1.0; DIM])])
        .await
        .unwrap();
    let embedder = FakeEmbedder::hashed(DIM);
    let service = ingest_service(index.clone(), embedder.clone());

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("readme.txt"), "not a pdf").unwrap();

    let report = service.ingest_directory(dir.path(), true).await.unwrap();
    assert_eq!(report.chunks, 0);
    assert_eq!(report.added, 0);
    assert!(index.is_empty().await);
    assert_eq!(embedder.calls(), 0);
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn ingestion_futures_are_send() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let service = ingest_service(index.clone(), FakeEmbedder::hashed(DIM));
    let reconciler = reconciler(index, FakeEmbedder::hashed(DIM), ReconcileOptions::default());
    let batch = sample();

    assert_send(&reconciler.reconcile(&batch));
    assert_send(&service.ingest_file(std::path::Path::new("a.pdf"), "a.pdf"));
    assert_send(&service.ingest_directory(std::path::Path::new("data"), true));
}

#[tokio::test]
async fn ingestion_runs_on_a_spawned_task() {
    let index = Arc::new(InMemoryIndex::new("test", DIM));
    let service = Arc::new(ingest_service(index.clone(), FakeEmbedder::hashed(DIM)));
    let pages = vec![PageText {
        source: "spawned.pdf".into(),
        page: 0,
        text: "Enzymes lower activation energy.".into(),
    }];

    let report = tokio::spawn(async move { service.ingest_pages(pages).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(index.len().await, 1);
}
