//! Recovers JSON arrays from free-form model output.
//!
//! Recovery order:
//! 1. the trimmed output parsed as a JSON array;
//! 2. the span from the first `[` to the last `]`, as is and then with
//!    literal backslash escapes decoded;
//! 3. if that span still does not parse, a `Parse` error.
//!
//! Output without any `[` holds no array and yields an empty list instead of
//! an error, even when a stray `]` appears in prose. An opening `[` with no
//! usable closing bracket is a truncated array and stays a `Parse` error.

use crate::error::{RagError, RagResult};
use crate::models::{Difficulty, Flashcard, QuizQuestion};
use serde_json::Value;

pub fn extract_json_array(raw: &str) -> RagResult<Vec<Value>> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(items);
    }

    let (start, end) = match (raw.find('['), raw.rfind(']')) {
        (None, _) => {
            log::warn!("Generated output contains no JSON array, returning no items");
            return Ok(Vec::new());
        }
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(RagError::Parse(format!(
                "unbalanced brackets in output: {}",
                preview(raw)
            )))
        }
    };

    let span = &raw[start..=end];
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(span) {
        return Ok(items);
    }

    match serde_json::from_str::<Value>(&unescape(span)) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(RagError::Parse(format!("expected a JSON array: {}", preview(raw)))),
        Err(err) => Err(RagError::Parse(format!("{} in {}", err, preview(raw)))),
    }
}

/// Keeps the first `count` items that carry both a question and an answer.
pub fn parse_flashcards(raw: &str, count: usize, topic: &str, difficulty: Difficulty) -> RagResult<Vec<Flashcard>> {
    let items = extract_json_array(raw)?;
    let total = items.len();

    let cards: Vec<Flashcard> = items
        .iter()
        .filter_map(|item| {
            Some(Flashcard {
                question: text_field(item, "question")?,
                answer: text_field(item, "answer")?,
                topic: topic.to_string(),
                difficulty,
            })
        })
        .take(count)
        .collect();

    if cards.len() < total.min(count) {
        log::warn!("Only {} of {} generated flashcards had a question and an answer", cards.len(), total);
    }
    Ok(cards)
}

/// Keeps the first `count` questions with a question, at least two options
/// and a `correct_answer` index inside the options.
pub fn parse_quiz(raw: &str, count: usize) -> RagResult<Vec<QuizQuestion>> {
    let items = extract_json_array(raw)?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let question = text_field(item, "question")?;
            let options: Vec<String> = item
                .get("options")?
                .as_array()?
                .iter()
                .filter(|option| !option.is_null())
                .map(value_text)
                .collect();
            if options.len() < 2 {
                return None;
            }
            let correct_answer = item
                .get("correct_answer")
                .or_else(|| item.get("correctAnswer"))?
                .as_u64()? as usize;
            if correct_answer >= options.len() {
                return None;
            }
            Some(QuizQuestion {
                question,
                options,
                correct_answer,
                explanation: text_field(item, "explanation").unwrap_or_default(),
            })
        })
        .take(count)
        .collect())
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.as_object()?.get(key)? {
        Value::Null => None,
        value => Some(value_text(value)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes literal backslash escapes (`\n`, `\"`, `\uXXXX`, ...).
/// Unknown escapes are left as written.
fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push_str("\\u"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > 120 {
        format!("{}...", trimmed.chars().take(120).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
