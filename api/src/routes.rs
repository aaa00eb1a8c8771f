use crate::api_error::ApiError;
use crate::auth;
use crate::payloads::*;
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_rag::document_processor::is_pdf;
use study_rag::{Config, RagSystem};
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    /// `None` when the vector index could not be reached at startup.
    pub system: Option<Arc<RagSystem>>,
    pub index_name: String,
    pub data_path: PathBuf,
    pub top_k: usize,
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(config: &Config, system: Option<Arc<RagSystem>>) -> Self {
        Self {
            system,
            index_name: config.index_name.clone(),
            data_path: config.data_path.clone(),
            top_k: config.top_k,
            api_token: config.api_token.clone(),
        }
    }

    fn system(&self) -> Result<&RagSystem, ApiError> {
        self.system.as_deref().ok_or_else(ApiError::uninitialized)
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let pipeline = Router::new()
        .route("/upload-documents", post(upload_document))
        .route("/upload-directory", post(upload_directory))
        .route("/query", post(query))
        .route("/generate-flashcards", post(generate_flashcards))
        .route("/generate-quiz", post(generate_quiz))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(pipeline)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "RAG API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "endpoints": {
            "upload": "/upload-documents",
            "upload_directory": "/upload-directory",
            "query": "/query",
            "generate_flashcards": "/generate-flashcards",
            "generate_quiz": "/generate-quiz",
            "health": "/health"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let vectorstore = if state.system.is_some() { "initialized" } else { "not_initialized" };
    Json(HealthResponse {
        status: "healthy".to_string(),
        vectorstore: vectorstore.to_string(),
        index_name: state.index_name.clone(),
    })
}

/// Streams the multipart `file` field into a temporary `.pdf` and ingests it.
/// The temporary file is removed when it drops, on every return path.
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !is_pdf(Path::new(&filename)) {
            return Err(ApiError::bad_request("File must be a PDF"));
        }

        let tmp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".pdf")
            .tempfile()
            .map_err(ApiError::internal)?;
        let mut file = tokio::fs::File::from_std(tmp.reopen().map_err(ApiError::internal)?);

        let mut size = 0;
        while let Some(bytes) = field.chunk().await? {
            size += bytes.len();
            file.write_all(&bytes).await.map_err(ApiError::internal)?;
        }
        file.flush().await.map_err(ApiError::internal)?;

        upload = Some((filename, tmp, size));
        break;
    }

    let Some((filename, tmp, size)) = upload else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    if size == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    log::info!("Received {} ({} bytes)", filename, size);

    let report = state.system()?.ingest.ingest_file(tmp.path(), &filename).await?;

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded and processed {}", filename),
        documents_processed: report.chunks,
    }))
}

async fn upload_directory(
    State(state): State<AppState>,
    Query(params): Query<DirectoryParams>,
) -> Result<Json<UploadResponse>, ApiError> {
    let system = state.system()?;
    let report = system
        .ingest
        .ingest_directory(&state.data_path, params.reset.unwrap_or(true))
        .await?;

    Ok(Json(UploadResponse {
        message: "Successfully uploaded and processed all documents from data directory".to_string(),
        documents_processed: report.chunks,
    }))
}

/// `query` comes from the query string, or from a JSON body when absent there.
async fn query(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<QueryResponse>, ApiError> {
    let Query(params) = params?;
    if params.k == Some(0) {
        return Err(ApiError::bad_request("k must be at least 1"));
    }

    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<QueryPayload>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?
            .query
    };

    let text = params.query.or(from_body).unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("Query cannot be empty"));
    }

    let answer = state
        .system()?
        .query
        .answer(&text, params.k.unwrap_or(state.top_k))
        .await?;

    Ok(Json(QueryResponse {
        response: answer.answer_text,
        sources: answer.source_ids,
    }))
}

async fn generate_flashcards(
    State(state): State<AppState>,
    payload: Result<Json<FlashcardRequest>, JsonRejection>,
) -> Result<Json<FlashcardResponse>, ApiError> {
    let Json(request) = payload?;
    let difficulty = parse_difficulty(request.difficulty.as_deref()).map_err(ApiError::bad_request)?;
    let topic = request.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    let set = state
        .system()?
        .query
        .generate_flashcards(&topic, request.num_flashcards, difficulty)
        .await?;

    Ok(Json(FlashcardResponse {
        flashcards: set.flashcards,
        topic: set.topic,
        sources: set.source_ids,
    }))
}

async fn generate_quiz(
    State(state): State<AppState>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<Json<QuizResponse>, ApiError> {
    let Json(request) = payload?;
    let difficulty = parse_difficulty(request.difficulty.as_deref()).map_err(ApiError::bad_request)?;
    let topic = request.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    let quiz = state
        .system()?
        .query
        .generate_quiz(&topic, request.num_questions, difficulty)
        .await?;

    Ok(Json(QuizResponse {
        questions: quiz.questions,
        topic: quiz.topic,
        difficulty: quiz.difficulty,
        sources: quiz.source_ids,
    }))
}
