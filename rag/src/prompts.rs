use crate::models::{Difficulty, QueryMatch};

/// Placed between retrieved chunk texts when building the context.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Joins match texts in rank order.
pub fn build_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

pub fn render_query_prompt(context: &str, question: &str) -> String {
    format!(
        r#"
Answer the question based only on the following context:

{context}

---

Answer the question based on the above context: {question}
"#
    )
}

pub fn render_flashcard_prompt(context: &str, topic: &str, count: usize, difficulty: Difficulty) -> String {
    format!(
        r#"You are creating study flashcards from course material.

Using ONLY the context below, write exactly {count} flashcards about "{topic}" at {difficulty} difficulty.

CONTEXT:
{context}

Respond with a JSON array of exactly {count} objects and nothing else. Each object must have:
- "question": a question a student should be able to answer
- "answer": a concise, correct answer taken from the context

Example format:
[{{"question": "...", "answer": "..."}}]"#
    )
}

pub fn render_quiz_prompt(context: &str, topic: &str, count: usize, difficulty: Difficulty) -> String {
    format!(
        r#"You are writing a multiple-choice quiz from course material.

Using ONLY the context below, write exactly {count} questions about "{topic}" at {difficulty} difficulty.

CONTEXT:
{context}

Respond with a JSON array of exactly {count} objects and nothing else. Each object must have:
- "question": the question text
- "options": an array of exactly 4 answer choices
- "correct_answer": the zero-based index of the correct choice
- "explanation": one or two sentences explaining the correct choice

Example format:
[{{"question": "...", "options": ["...", "...", "...", "..."], "correct_answer": 0, "explanation": "..."}}]"#
    )
}
