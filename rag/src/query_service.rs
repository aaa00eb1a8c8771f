use crate::embedding_service::Embedder;
use crate::error::{RagError, RagResult, Stage};
use crate::generation_service::Generator;
use crate::models::*;
use crate::prompts;
use crate::structured;
use crate::vector_index::VectorIndex;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_STRUCTURED_ITEMS: usize = 10;

/// Retrieval-augmented answering and structured study-material generation.
pub struct QueryService {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl QueryService {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            index,
            embedder,
            generator,
        }
    }

    /// Answers `query_text` from the `k` most similar chunks.
    ///
    /// Ties in similarity are ordered however the index returns them.
    pub async fn answer(&self, query_text: &str, k: usize) -> RagResult<Answer> {
        if query_text.trim().is_empty() {
            return Err(RagError::invalid("Query cannot be empty"));
        }
        if k == 0 {
            return Err(RagError::invalid("k must be at least 1"));
        }

        let matches = self.retrieve(query_text, k).await?;
        let context = prompts::build_context(&matches);
        let prompt = prompts::render_query_prompt(&context, query_text);
        let answer_text = self.generate(&prompt).await?;

        Ok(Answer {
            answer_text,
            source_ids: source_ids(&matches),
        })
    }

    pub async fn generate_flashcards(&self, topic: &str, count: usize, difficulty: Difficulty) -> RagResult<FlashcardSet> {
        let topic = validate_structured_request(topic, count, "num_flashcards")?;

        let matches = self.retrieve_for_topic(topic, count).await?;
        let context = prompts::build_context(&matches);
        let prompt = prompts::render_flashcard_prompt(&context, topic, count, difficulty);
        let output = self.generate(&prompt).await?;

        let flashcards = structured::parse_flashcards(&output, count, topic, difficulty)?;
        log::info!("Generated {} flashcards about {}", flashcards.len(), topic);

        Ok(FlashcardSet {
            flashcards,
            topic: topic.to_string(),
            source_ids: source_ids(&matches),
        })
    }

    pub async fn generate_quiz(&self, topic: &str, count: usize, difficulty: Difficulty) -> RagResult<Quiz> {
        let topic = validate_structured_request(topic, count, "num_questions")?;

        let matches = self.retrieve_for_topic(topic, count).await?;
        let context = prompts::build_context(&matches);
        let prompt = prompts::render_quiz_prompt(&context, topic, count, difficulty);
        let output = self.generate(&prompt).await?;

        let questions = structured::parse_quiz(&output, count)?;
        log::info!("Generated {} quiz questions about {}", questions.len(), topic);

        Ok(Quiz {
            questions,
            topic: topic.to_string(),
            difficulty,
            source_ids: source_ids(&matches),
        })
    }

    async fn retrieve(&self, text: &str, k: usize) -> RagResult<Vec<QueryMatch>> {
        let mut vectors = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(|e| RagError::at(Stage::Embedding, e))?;
        let vector = vectors
            .pop()
            .ok_or_else(|| RagError::at(Stage::Embedding, anyhow::anyhow!("embedder returned no vector")))?;

        let matches = self
            .index
            .query(&vector, k)
            .await
            .map_err(|e| RagError::at(Stage::Search, e))?;

        log::info!("Found {} relevant chunks", matches.len());
        Ok(matches)
    }

    async fn retrieve_for_topic(&self, topic: &str, count: usize) -> RagResult<Vec<QueryMatch>> {
        let matches = self.retrieve(&format!("content related to {}", topic), count).await?;
        if matches.is_empty() {
            return Err(RagError::NotFound(format!(
                "No relevant content found for topic '{}'. Upload documents first.",
                topic
            )));
        }
        Ok(matches)
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        log::debug!("Sending {} char prompt to {}", prompt.len(), self.generator.model_name());
        self.generator
            .complete(prompt)
            .await
            .map_err(|e| RagError::at(Stage::Generation, e))
    }
}

fn validate_structured_request<'a>(topic: &'a str, count: usize, count_field: &str) -> RagResult<&'a str> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(RagError::invalid("Topic cannot be empty"));
    }
    if !(1..=MAX_STRUCTURED_ITEMS).contains(&count) {
        return Err(RagError::invalid(format!(
            "{} must be between 1 and {}",
            count_field, MAX_STRUCTURED_ITEMS
        )));
    }
    Ok(topic)
}

fn source_ids(matches: &[QueryMatch]) -> Vec<Option<String>> {
    matches.iter().map(|m| m.id.clone()).collect()
}
