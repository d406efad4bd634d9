//! Prompt templates for question generation.

use std::collections::HashMap;

/// Collection of prompt templates.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub questions: QuestionPrompts,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            questions: QuestionPrompts::default(),
        }
    }
}

/// Prompts for generating educational questions from transcripts.
#[derive(Debug, Clone)]
pub struct QuestionPrompts {
    pub system: String,
    pub user: String,
}

impl Default for QuestionPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an educational content designer. You create quiz questions from video transcripts.

Rules:
1. Every question must be answerable from the transcript text alone.
2. Cover the substantive content; skip intros, outros, and channel promotion.
3. Mix difficulties and question types across the set.
4. Each question must reference the video it was drawn from by its id.

Respond with ONLY a JSON array. Each element is an object with these fields:
- "question_text": the question (required, non-empty)
- "answer": a concise correct answer
- "context": the transcript snippet the question is based on
- "difficulty": one of "easy", "medium", "hard"
- "question_type": one of "factual", "conceptual", "analytical"
- "video_id": the id of the source video

No prose before or after the array."#
                .to_string(),

            user: r#"Generate exactly {{count}} questions from the following video transcripts.

{{transcripts}}

Remember: respond with only the JSON array of {{count}} question objects."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Render a template, substituting `{{name}}` placeholders.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut out = template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }
}
