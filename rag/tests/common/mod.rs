#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use study_rag::{
    assign_ids, Chunk, Embedder, Generator, InMemoryIndex, IndexDescription, IndexError, IndexRecord, QueryMatch,
    VectorIndex,
};

pub enum EmbedMode {
    /// Vector derived from the text bytes.
    Hashed,
    /// Same vector for every input.
    Constant(Vec<f32>),
    Fail,
}

pub struct FakeEmbedder {
    dim: usize,
    mode: EmbedMode,
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn hashed(dim: usize) -> Arc<Self> {
        Arc::new(Self::with_mode(dim, EmbedMode::Hashed))
    }

    pub fn constant(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self::with_mode(vector.len(), EmbedMode::Constant(vector)))
    }

    pub fn failing(dim: usize) -> Arc<Self> {
        Arc::new(Self::with_mode(dim, EmbedMode::Fail))
    }

    fn with_mode(dim: usize, mode: EmbedMode) -> Self {
        Self {
            dim,
            mode,
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inputs.lock().unwrap().extend(texts.iter().cloned());

        match &self.mode {
            EmbedMode::Fail => bail!("embedding service unavailable"),
            EmbedMode::Constant(vector) => Ok(texts.iter().map(|_| vector.clone()).collect()),
            EmbedMode::Hashed => Ok(texts
                .iter()
                .map(|text| {
                    let seed: usize = text.bytes().map(usize::from).sum();
                    (0..self.dim).map(|i| ((seed + i) % 7 + 1) as f32).collect()
                })
                .collect()),
        }
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dim)
    }
}

pub struct FakeGenerator {
    /// `None` makes every completion fail.
    response: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Some(response.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.response {
            Some(response) => Ok(response.clone()),
            None => bail!("model overloaded"),
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// An index whose backing store has been deleted.
pub struct MissingIndex;

#[async_trait]
impl VectorIndex for MissingIndex {
    fn name(&self) -> &str {
        "missing"
    }

    async fn describe(&self) -> Result<IndexDescription, IndexError> {
        Err(IndexError::NotFound("missing".into()))
    }

    async fn upsert(&self, _records: Vec<IndexRecord>) -> Result<(), IndexError> {
        Err(IndexError::NotFound("missing".into()))
    }

    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<QueryMatch>, IndexError> {
        Err(IndexError::NotFound("missing".into()))
    }

    async fn list_ids(&self) -> Result<Option<HashSet<String>>, IndexError> {
        Err(IndexError::NotFound("missing".into()))
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        Err(IndexError::NotFound("missing".into()))
    }
}

/// In-memory index whose `fail_on`-th upsert call (1-based) fails.
pub struct FlakyIndex {
    pub inner: InMemoryIndex,
    fail_on: usize,
    upserts: AtomicUsize,
}

impl FlakyIndex {
    pub fn new(dimension: usize, fail_on: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryIndex::new("flaky", dimension),
            fail_on,
            upserts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn describe(&self) -> Result<IndexDescription, IndexError> {
        self.inner.describe().await
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        let call = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(anyhow::anyhow!("connection reset during upsert").into());
        }
        self.inner.upsert(records).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, IndexError> {
        self.inner.query(vector, top_k).await
    }

    async fn list_ids(&self) -> Result<Option<HashSet<String>>, IndexError> {
        self.inner.list_ids().await
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        self.inner.delete_all().await
    }
}

/// Identified chunks for `source`, one entry per `(page, text)`.
pub fn chunks(source: &str, pages: &[(usize, &str)]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = pages
        .iter()
        .map(|(page, text)| Chunk::new(*text, source, *page))
        .collect();
    assign_ids(&mut chunks);
    chunks
}

pub fn record(id: &str, text: &str, values: Vec<f32>) -> IndexRecord {
    let mut chunk = Chunk::new(text, "notes.pdf", 0);
    chunk.id = id.to_string();
    IndexRecord::from_chunk(&chunk, values)
}
