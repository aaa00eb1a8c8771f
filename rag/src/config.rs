//! Environment-driven settings. `dotenv` is loaded by the binaries before
//! `Config::from_env` runs.

use crate::document_processor::TextSplitter;
use crate::error::{RagError, RagResult};
use crate::reconciler::{ExistingIdStrategy, ReconcileOptions};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorProvider {
    OpenAi,
    Gemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Pinecone,
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
    pub generator: GeneratorProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub vector_backend: VectorBackend,
    pub pinecone_api_key: Option<String>,
    pub index_name: String,
    pub pinecone_cloud: String,
    pub pinecone_region: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub upsert_batch_size: usize,
    pub top_k: usize,
    pub data_path: PathBuf,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    pub api_token: Option<String>,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> RagResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> RagResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let generator = match or("GENERATOR_PROVIDER", "openai").to_ascii_lowercase().as_str() {
            "openai" => GeneratorProvider::OpenAi,
            "gemini" => GeneratorProvider::Gemini,
            other => {
                return Err(RagError::Config(format!(
                    "GENERATOR_PROVIDER must be openai or gemini, got '{}'",
                    other
                )))
            }
        };
        let vector_backend = match or("VECTOR_BACKEND", "pinecone").to_ascii_lowercase().as_str() {
            "pinecone" => VectorBackend::Pinecone,
            "memory" => VectorBackend::Memory,
            other => {
                return Err(RagError::Config(format!(
                    "VECTOR_BACKEND must be pinecone or memory, got '{}'",
                    other
                )))
            }
        };

        let openai_api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        let gemini_api_key = get("GEMINI_API_KEY");
        if generator == GeneratorProvider::Gemini && gemini_api_key.is_none() {
            return Err(RagError::Config("GEMINI_API_KEY environment variable not set".into()));
        }
        let pinecone_api_key = get("PINECONE_API_KEY");
        if vector_backend == VectorBackend::Pinecone && pinecone_api_key.is_none() {
            return Err(RagError::Config("PINECONE_API_KEY environment variable not set".into()));
        }

        let config = Self {
            openai_api_key,
            openai_base_url: or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            embedding_model: or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimensions: parse(&get, "EMBEDDING_DIMENSIONS", 1536)?,
            chat_model: or("CHAT_MODEL", "gpt-4o"),
            generator,
            gemini_api_key,
            gemini_model: or("GEMINI_MODEL", "gemini-2.5-flash"),
            temperature: parse(&get, "TEMPERATURE", 0.7)?,
            max_output_tokens: parse(&get, "MAX_OUTPUT_TOKENS", 2048)?,
            vector_backend,
            pinecone_api_key,
            index_name: or("PINECONE_INDEX", "neo-docs"),
            pinecone_cloud: or("PINECONE_CLOUD", "aws"),
            pinecone_region: or("PINECONE_REGION", "us-east-1"),
            chunk_size: parse(&get, "CHUNK_SIZE", 800)?,
            chunk_overlap: parse(&get, "CHUNK_OVERLAP", 80)?,
            upsert_batch_size: parse(&get, "UPSERT_BATCH_SIZE", 100)?,
            top_k: parse(&get, "TOP_K", 5)?,
            data_path: PathBuf::from(or("DATA_PATH", "data")),
            request_timeout: Duration::from_secs(parse(&get, "REQUEST_TIMEOUT_SECS", 60)?),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            api_token: get("API_TOKEN"),
            bind_addr: or("BIND_ADDR", "0.0.0.0:8000"),
        };

        if config.upsert_batch_size == 0 || config.top_k == 0 || config.embedding_dimensions == 0 {
            return Err(RagError::Config(
                "UPSERT_BATCH_SIZE, TOP_K and EMBEDDING_DIMENSIONS must be positive".into(),
            ));
        }
        config.splitter()?;

        Ok(config)
    }

    pub fn splitter(&self) -> RagResult<TextSplitter> {
        TextSplitter::new(self.chunk_size, self.chunk_overlap).map_err(|e| RagError::Config(e.to_string()))
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            batch_size: self.upsert_batch_size,
            strategy: ExistingIdStrategy::Auto,
            ..ReconcileOptions::default()
        }
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> RagResult<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| RagError::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}
