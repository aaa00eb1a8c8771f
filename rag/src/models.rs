use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Text of a single page as produced by the PDF loader. Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub source: String,
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub page: usize,
    pub sequence_in_page: usize,
    /// `"{source}:{page}:{sequence_in_page}"`, empty until identified.
    pub id: String,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, page: usize) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            page,
            sequence_in_page: 0,
            id: String::new(),
        }
    }

    pub fn page_key(&self) -> String {
        format!("{}:{}", self.source, self.page)
    }
}

/// One entry written to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IndexRecord {
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("id".to_string(), serde_json::Value::from(chunk.id.clone()));
        metadata.insert("text".to_string(), serde_json::Value::from(chunk.content.clone()));
        metadata.insert("source".to_string(), serde_json::Value::from(chunk.source.clone()));
        metadata.insert("page".to_string(), serde_json::Value::from(chunk.page));

        Self {
            id: chunk.id.clone(),
            values,
            metadata,
        }
    }
}

/// A ranked similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// The `id` metadata field, if the stored entry carried one.
    pub id: Option<String>,
    pub text: String,
    pub score: f32,
    pub source: Option<String>,
}

impl QueryMatch {
    /// Reads a hit out of index metadata, tolerating missing fields.
    pub fn from_metadata(score: f32, metadata: &HashMap<String, serde_json::Value>) -> Self {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };

        Self {
            id: field("id"),
            text: field("text").unwrap_or_default(),
            score,
            source: field("source"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer_text: String,
    pub source_ids: Vec<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "Difficulty must be one of easy, medium, hard (got '{}')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    pub topic: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub flashcards: Vec<Flashcard>,
    pub topic: String,
    pub source_ids: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    pub topic: String,
    pub difficulty: Difficulty,
    pub source_ids: Vec<Option<String>>,
}
