use crate::chunk_ids::assign_ids;
use crate::document_processor::DocumentProcessor;
use crate::error::{RagError, RagResult, Stage};
use crate::models::PageText;
use crate::reconciler::IndexReconciler;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks produced from the input.
    pub chunks: usize,
    /// Chunks that were new to the index and got written.
    pub added: usize,
}

/// Load → split → identify → reconcile.
pub struct IngestService {
    processor: DocumentProcessor,
    reconciler: IndexReconciler,
}

impl IngestService {
    pub fn new(processor: DocumentProcessor, reconciler: IndexReconciler) -> Self {
        Self {
            processor,
            reconciler,
        }
    }

    /// Ingests one PDF. `source` names the document in chunk IDs.
    pub async fn ingest_file(&self, path: &Path, source: &str) -> RagResult<IngestReport> {
        let processor = self.processor.clone();
        let path = path.to_path_buf();
        let source = source.to_string();

        let pages = tokio::task::spawn_blocking(move || processor.load_pdf(&path, &source))
            .await
            .map_err(|e| RagError::at(Stage::Loading, e))?
            .map_err(|e| RagError::at(Stage::Loading, e))?;

        self.ingest_pages(pages).await
    }

    /// Ingests every PDF in `dir`, optionally wiping the index first.
    pub async fn ingest_directory(&self, dir: &Path, reset: bool) -> RagResult<IngestReport> {
        if !dir.is_dir() {
            return Err(RagError::NotFound(format!(
                "Data directory {} not found. This endpoint only works in local development.",
                dir.display()
            )));
        }

        if reset {
            self.reconciler.clear().await?;
        }

        let processor = self.processor.clone();
        let dir: PathBuf = dir.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || processor.load_directory(&dir))
            .await
            .map_err(|e| RagError::at(Stage::Loading, e))?
            .map_err(|e| RagError::at(Stage::Loading, e))?;

        self.ingest_pages(pages).await
    }

    pub async fn ingest_pages(&self, pages: Vec<PageText>) -> RagResult<IngestReport> {
        let processor = self.processor.clone();
        let mut chunks = tokio::task::spawn_blocking(move || processor.split_pages(&pages))
            .await
            .map_err(|e| RagError::at(Stage::Loading, e))?;
        assign_ids(&mut chunks);

        let added = self.reconciler.reconcile(&chunks).await?;
        Ok(IngestReport {
            chunks: chunks.len(),
            added,
        })
    }
}
