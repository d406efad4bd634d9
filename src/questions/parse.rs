//! Parsing of LLM responses into validated questions.
//!
//! Models wrap their output in prose, code fences, or half-finished JSON
//! often enough that we extract the first balanced array ourselves and
//! validate items one by one, dropping the malformed rather than failing
//! the batch.

use crate::store::NewQuestion;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// A question object as the model produced it, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuestion {
    question_text: Option<String>,
    answer: Option<String>,
    context: Option<String>,
    difficulty: Option<String>,
    question_type: Option<String>,
    video_id: Option<String>,
}

/// Extract the first balanced JSON array from `text`, honoring strings and
/// escapes.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse and validate the model response.
///
/// Kept items have a non-empty question_text and a video_id from the
/// requested set; enum fields that don't parse are nulled rather than
/// dropping the item.
pub fn parse_questions(body: &str, requested_ids: &HashSet<String>) -> Vec<NewQuestion> {
    let Some(array_str) = extract_json_array(body) else {
        debug!("No JSON array found in response");
        return Vec::new();
    };

    let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(array_str) else {
        debug!("Extracted array is not valid JSON");
        return Vec::new();
    };

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        let Ok(raw) = serde_json::from_value::<RawQuestion>(item) else {
            continue;
        };

        let Some(question_text) = raw
            .question_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
        else {
            continue;
        };

        let Some(video_id) = raw.video_id.filter(|id| requested_ids.contains(id)) else {
            continue;
        };

        questions.push(NewQuestion {
            video_id,
            question_text,
            answer: raw.answer.filter(|a| !a.trim().is_empty()),
            context: raw.context.filter(|c| !c.trim().is_empty()),
            difficulty: raw.difficulty.and_then(|d| d.parse().ok()),
            question_type: raw.question_type.and_then(|t| t.parse().ok()),
        });
    }

    questions
}
