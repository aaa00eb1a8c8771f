use crate::config::{Config, GeneratorProvider, VectorBackend};
use crate::document_processor::DocumentProcessor;
use crate::embedding_service::{Embedder, OpenAiEmbedder};
use crate::error::{RagError, RagResult};
use crate::generation_service::{GeminiGenerator, Generator, OpenAiGenerator};
use crate::ingest_service::IngestService;
use crate::pinecone::{PineconeIndex, ServerlessSpec};
use crate::query_service::QueryService;
use crate::reconciler::IndexReconciler;
use crate::vector_index::{InMemoryIndex, VectorIndex};
use std::sync::Arc;

/// Composition root: client handles are built once here and shared by the
/// ingestion and query pipelines.
pub struct RagSystem {
    pub ingest: IngestService,
    pub query: QueryService,
}

impl RagSystem {
    pub async fn from_config(config: &Config) -> RagResult<Self> {
        log::info!("Initializing RAG system...");

        let embedder: Arc<dyn Embedder> = Arc::new(
            OpenAiEmbedder::new(
                &config.openai_api_key,
                &config.openai_base_url,
                &config.embedding_model,
                Some(config.embedding_dimensions),
                config.request_timeout,
            )
            .map_err(|e| RagError::Config(e.to_string()))?,
        );

        let generator: Arc<dyn Generator> = match config.generator {
            GeneratorProvider::OpenAi => Arc::new(
                OpenAiGenerator::new(
                    &config.openai_api_key,
                    &config.openai_base_url,
                    &config.chat_model,
                    config.temperature,
                    config.request_timeout,
                )
                .map_err(|e| RagError::Config(e.to_string()))?,
            ),
            GeneratorProvider::Gemini => Arc::new(
                GeminiGenerator::new(
                    config.gemini_api_key.as_deref().unwrap_or_default(),
                    &config.gemini_model,
                    config.temperature,
                    config.max_output_tokens,
                    config.request_timeout,
                )
                .map_err(|e| RagError::Config(e.to_string()))?,
            ),
        };

        let index: Arc<dyn VectorIndex> = match config.vector_backend {
            VectorBackend::Memory => Arc::new(InMemoryIndex::new(&config.index_name, config.embedding_dimensions)),
            VectorBackend::Pinecone => {
                let spec = ServerlessSpec {
                    cloud: config.pinecone_cloud.clone(),
                    region: config.pinecone_region.clone(),
                };
                let index = PineconeIndex::connect(
                    config.pinecone_api_key.as_deref().unwrap_or_default(),
                    &config.index_name,
                    config.embedding_dimensions,
                    &spec,
                    config.request_timeout,
                )
                .await
                .map_err(|e| RagError::Config(format!("could not initialize vector index: {}", e)))?;
                Arc::new(index)
            }
        };

        log::info!(
            "RAG system initialized (index {}, generator {})",
            index.name(),
            generator.model_name()
        );
        Self::with_handles(config, index, embedder, generator)
    }

    /// Wires pipelines around already-built handles.
    pub fn with_handles(
        config: &Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> RagResult<Self> {
        let processor = DocumentProcessor::new(config.splitter()?);
        let reconciler = IndexReconciler::new(index.clone(), embedder.clone(), config.reconcile_options());

        Ok(Self {
            ingest: IngestService::new(processor, reconciler),
            query: QueryService::new(index, embedder, generator),
        })
    }
}
