use serde::{Deserialize, Serialize};
use study_rag::{Difficulty, Flashcard, QuizQuestion};

/// Topic used when a structured request leaves it out.
pub const DEFAULT_TOPIC: &str = "the uploaded material";

fn default_count() -> usize {
    5
}

#[derive(Deserialize, Default)]
pub struct QueryParams {
    pub query: Option<String>,
    pub k: Option<usize>,
}

#[derive(Deserialize)]
pub struct QueryPayload {
    pub query: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DirectoryParams {
    /// Wipe the index first. The hosted service always did.
    pub reset: Option<bool>,
}

#[derive(Deserialize)]
pub struct FlashcardRequest {
    pub topic: Option<String>,
    #[serde(default = "default_count")]
    pub num_flashcards: usize,
    pub difficulty: Option<String>,
}

#[derive(Deserialize)]
pub struct QuizRequest {
    pub topic: Option<String>,
    #[serde(default = "default_count")]
    pub num_questions: usize,
    pub difficulty: Option<String>,
}

/// Missing difficulty means easy.
pub fn parse_difficulty(raw: Option<&str>) -> Result<Difficulty, String> {
    raw.map_or(Ok(Difficulty::Easy), str::parse)
}

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub documents_processed: usize,
}

#[derive(Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<Option<String>>,
}

#[derive(Serialize, Deserialize)]
pub struct FlashcardResponse {
    pub flashcards: Vec<Flashcard>,
    pub topic: String,
    pub sources: Vec<Option<String>>,
}

#[derive(Serialize, Deserialize)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestion>,
    pub topic: String,
    pub difficulty: Difficulty,
    pub sources: Vec<Option<String>>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub vectorstore: String,
    pub index_name: String,
}
