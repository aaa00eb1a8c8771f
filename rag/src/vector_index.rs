//! Vector index abstraction and the in-process implementation.

use crate::models::{IndexRecord, QueryMatch};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index `{0}` does not exist")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub dimension: usize,
    pub record_count: usize,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    async fn describe(&self) -> Result<IndexDescription, IndexError>;

    /// Inserts or overwrites records by ID.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError>;

    /// Top `top_k` matches, best score first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, IndexError>;

    /// Every stored ID, or `None` when the backend cannot enumerate keys.
    async fn list_ids(&self) -> Result<Option<HashSet<String>>, IndexError>;

    async fn delete_all(&self) -> Result<(), IndexError>;
}

struct StoredVector {
    values: Vec<f32>,
    metadata: HashMap<String, Value>,
}

/// Cosine-similarity index held in process memory.
pub struct InMemoryIndex {
    name: String,
    dimension: usize,
    listing: bool,
    records: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            listing: true,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Hides `list_ids`, so callers must discover IDs through `query`.
    pub fn without_listing(mut self) -> Self {
        self.listing = false;
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self) -> Result<IndexDescription, IndexError> {
        Ok(IndexDescription {
            dimension: self.dimension,
            record_count: self.len().await,
        })
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.dimension) {
            return Err(anyhow::anyhow!(
                "vector for `{}` has dimension {}, index `{}` expects {}",
                bad.id,
                bad.values.len(),
                self.name,
                self.dimension
            )
            .into());
        }

        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(
                record.id,
                StoredVector {
                    values: record.values,
                    metadata: record.metadata,
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, IndexError> {
        if vector.len() != self.dimension {
            return Err(anyhow::anyhow!(
                "query vector has dimension {}, index `{}` expects {}",
                vector.len(),
                self.name,
                self.dimension
            )
            .into());
        }

        let stored = self.records.read().await;
        let mut scored: Vec<QueryMatch> = stored
            .values()
            .map(|entry| QueryMatch::from_metadata(cosine_similarity(vector, &entry.values), &entry.metadata))
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list_ids(&self) -> Result<Option<HashSet<String>>, IndexError> {
        if !self.listing {
            return Ok(None);
        }
        Ok(Some(self.records.read().await.keys().cloned().collect()))
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        self.records.write().await.clear();
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let min_len = a.len().min(b.len());

    let dot_product: f32 = a[..min_len].iter().zip(&b[..min_len]).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn record(id: &str, values: Vec<f32>) -> IndexRecord {
        let mut chunk = Chunk::new(format!("text of {}", id), "doc.pdf", 0);
        chunk.id = id.to_string();
        IndexRecord::from_chunk(&chunk, values)
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_score() {
        let index = InMemoryIndex::new("test", 2);
        index
            .upsert(vec![
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.1]),
                record("middle", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["near", "middle"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn upsert_overwrites_same_id() {
        let index = InMemoryIndex::new("test", 2);
        index.upsert(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        index.upsert(vec![record("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let index = InMemoryIndex::new("test", 3);
        assert!(index.upsert(vec![record("a", vec![1.0])]).await.is_err());
        assert!(index.query(&[1.0], 1).await.is_err());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn listing_can_be_disabled() {
        let index = InMemoryIndex::new("test", 1).without_listing();
        index.upsert(vec![record("a", vec![1.0])]).await.unwrap();
        assert_eq!(index.list_ids().await.unwrap(), None);

        index.delete_all().await.unwrap();
        assert_eq!(index.describe().await.unwrap().record_count, 0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
