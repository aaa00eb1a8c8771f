//! Incremental upsert: only chunks whose IDs are not yet in the index get
//! embedded and written.
//!
//! Writes are not transactional. If an upsert batch fails, earlier batches
//! stay written; running `reconcile` again picks up only what is still
//! missing because the diff is recomputed from the index.

use crate::embedding_service::Embedder;
use crate::error::{RagError, RagResult, Stage};
use crate::models::{Chunk, IndexRecord};
use crate::vector_index::{IndexError, VectorIndex};
use std::collections::HashSet;
use std::sync::Arc;

/// How existing IDs are read back from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingIdStrategy {
    /// Native listing when the backend has it, broad query otherwise.
    Auto,
    Listing,
    /// A similarity query wide enough to return every entry, reading the
    /// `id` metadata off each hit.
    BroadQuery,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Upper bound for one embedding request and one upsert request.
    pub batch_size: usize,
    pub strategy: ExistingIdStrategy,
    /// `top_k` of the broad query.
    pub broad_query_k: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            strategy: ExistingIdStrategy::Auto,
            broad_query_k: 10_000,
        }
    }
}

pub struct IndexReconciler {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    options: ReconcileOptions,
}

impl IndexReconciler {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, options: ReconcileOptions) -> Self {
        Self {
            index,
            embedder,
            options,
        }
    }

    /// Embeds and upserts the chunks not yet in the index and returns how
    /// many were written. Chunks must already carry their IDs.
    pub async fn reconcile(&self, chunks: &[Chunk]) -> RagResult<usize> {
        if chunks.iter().any(|c| c.id.is_empty()) {
            return Err(RagError::invalid("chunks must be identified before reconciling"));
        }

        let dimension = self
            .index
            .describe()
            .await
            .map_err(|e| RagError::at(Stage::IndexLookup, e))?
            .dimension;

        if let Some(produced) = self.embedder.dimensions().filter(|&d| d != dimension) {
            return Err(RagError::at(
                Stage::Embedding,
                anyhow::anyhow!(
                    "dimension mismatch: embedder is configured for {}, index `{}` expects {}",
                    produced,
                    self.index.name(),
                    dimension
                ),
            ));
        }

        let existing = self.existing_ids(dimension).await?;
        log::info!("Number of existing documents in index: {}", existing.len());

        let mut queued = HashSet::new();
        let new_chunks: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| !existing.contains(&c.id) && queued.insert(c.id.as_str()))
            .collect();

        if new_chunks.is_empty() {
            log::info!("No new documents to add");
            return Ok(0);
        }
        log::info!("Adding new documents: {}", new_chunks.len());

        let batch_size = self.options.batch_size.max(1);
        let mut vectors = Vec::with_capacity(new_chunks.len());
        for batch in new_chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| RagError::at(Stage::Embedding, e))?;

            if embedded.len() != texts.len() {
                return Err(RagError::at(
                    Stage::Embedding,
                    anyhow::anyhow!("embedder returned {} vectors for {} texts", embedded.len(), texts.len()),
                ));
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != dimension) {
                return Err(RagError::at(
                    Stage::Embedding,
                    anyhow::anyhow!(
                        "dimension mismatch: embedder produced {}, index `{}` expects {}",
                        bad.len(),
                        self.index.name(),
                        dimension
                    ),
                ));
            }
            vectors.extend(embedded);
        }

        let records: Vec<IndexRecord> = new_chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| IndexRecord::from_chunk(chunk, values))
            .collect();
        let total = records.len();

        let mut pending = records.into_iter();
        let mut written = 0;
        loop {
            let batch: Vec<IndexRecord> = pending.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let size = batch.len();
            self.index
                .upsert(batch)
                .await
                .map_err(|e| RagError::at(Stage::Upsert, e))?;
            written += size;
            log::debug!("Upserted batch of {} ({} of {})", size, written, total);
        }

        log::info!("Successfully added {} documents to {}", written, self.index.name());
        Ok(written)
    }

    /// Deletes every entry. A missing index counts as already clear.
    pub async fn clear(&self) -> RagResult<()> {
        match self.index.delete_all().await {
            Ok(()) => {
                log::info!("Cleared index {}", self.index.name());
                Ok(())
            }
            Err(IndexError::NotFound(name)) => {
                log::info!("Index {} does not exist, nothing to clear", name);
                Ok(())
            }
            Err(err) => Err(RagError::at(Stage::Clear, err)),
        }
    }

    async fn existing_ids(&self, dimension: usize) -> RagResult<HashSet<String>> {
        match self.options.strategy {
            ExistingIdStrategy::Listing => self.listed_ids().await?.ok_or_else(|| {
                RagError::at(
                    Stage::IndexLookup,
                    anyhow::anyhow!("index `{}` cannot list its IDs", self.index.name()),
                )
            }),
            ExistingIdStrategy::BroadQuery => self.broad_query_ids(dimension).await,
            ExistingIdStrategy::Auto => match self.listed_ids().await? {
                Some(ids) => Ok(ids),
                None => self.broad_query_ids(dimension).await,
            },
        }
    }

    async fn listed_ids(&self) -> RagResult<Option<HashSet<String>>> {
        self.index
            .list_ids()
            .await
            .map_err(|e| RagError::at(Stage::IndexLookup, e))
    }

    async fn broad_query_ids(&self, dimension: usize) -> RagResult<HashSet<String>> {
        if dimension == 0 {
            return Ok(HashSet::new());
        }
        let unit = vec![1.0 / (dimension as f32).sqrt(); dimension];
        let hits = self
            .index
            .query(&unit, self.options.broad_query_k)
            .await
            .map_err(|e| RagError::at(Stage::IndexLookup, e))?;

        Ok(hits.into_iter().filter_map(|hit| hit.id).collect())
    }
}
