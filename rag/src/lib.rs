pub mod chunk_ids;
pub mod config;
pub mod document_processor;
pub mod embedding_service;
pub mod error;
pub mod generation_service;
pub mod ingest_service;
pub mod models;
pub mod pinecone;
pub mod prompts;
pub mod query_service;
pub mod rag_system;
pub mod reconciler;
pub mod structured;
pub mod vector_index;

pub use chunk_ids::assign_ids;
pub use config::{Config, GeneratorProvider, VectorBackend};
pub use document_processor::{DocumentProcessor, TextSplitter};
pub use embedding_service::{Embedder, OpenAiEmbedder};
pub use error::{RagError, RagResult, Stage};
pub use generation_service::{GeminiGenerator, Generator, OpenAiGenerator};
pub use ingest_service::{IngestReport, IngestService};
pub use models::*;
pub use pinecone::{PineconeIndex, ServerlessSpec};
pub use query_service::QueryService;
pub use rag_system::RagSystem;
pub use reconciler::{ExistingIdStrategy, IndexReconciler, ReconcileOptions};
pub use vector_index::{InMemoryIndex, IndexDescription, IndexError, VectorIndex};
