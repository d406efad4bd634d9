//! Question generation from stored transcriptions.

mod parse;

pub use parse::{extract_json_array, parse_questions};

use crate::config::{Prompts, Settings};
use crate::error::{KvissError, Result};
use crate::openai::{create_client_for_base, map_openai_err};
use crate::retry::{with_retry, RetryPolicy};
use crate::store::Store;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Requested counts are clamped to this range.
pub const MIN_QUESTION_COUNT: u32 = 1;
pub const MAX_QUESTION_COUNT: u32 = 50;
pub const DEFAULT_QUESTION_COUNT: u32 = 10;

/// Character budget for transcript text in the prompt, shared equally
/// across videos.
const PROMPT_CHAR_BUDGET: usize = 24_000;

/// Clamp a requested question count into the supported range.
pub fn clamp_count(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_QUESTION_COUNT)
        .clamp(MIN_QUESTION_COUNT, MAX_QUESTION_COUNT)
}

/// Per-video outcome within one generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateItemStatus {
    Success,
    NoTranscription,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct GenerateItemResult {
    pub video_id: String,
    pub status: GenerateItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Summary of one generation batch.
#[derive(Debug, Serialize)]
pub struct GenerationSummary {
    pub results: Vec<GenerateItemResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub no_transcription: usize,
    pub total_questions: usize,
    pub generation_id: Option<i64>,
}

/// Generates educational questions by prompting an LLM backend with
/// transcription text.
pub struct QuestionGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl QuestionGenerator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: create_client_for_base(&settings.llm.base_url),
            model: settings.llm.model.clone(),
            prompts: Prompts::default(),
            retry: RetryPolicy::llm(),
        }
    }

    /// Generate `count` questions over the given videos.
    ///
    /// Creates one Generation row holding every parsed question; per-video
    /// outcomes are reported in the summary. Fails with LlmUnavailable (and
    /// creates nothing) when the backend is down after retries.
    #[instrument(skip(self, store, video_ids), fields(videos = video_ids.len(), count = count))]
    pub async fn generate(
        &self,
        store: &Store,
        video_ids: &[String],
        count: u32,
    ) -> Result<GenerationSummary> {
        // Most recent transcription per unique video, preserving order.
        let mut seen = HashSet::new();
        let mut transcripts: Vec<(String, String)> = Vec::new();
        let mut missing: HashSet<String> = HashSet::new();

        for id in video_ids {
            if !seen.insert(id.clone()) {
                continue;
            }
            match store.latest_transcription_for_video(id)? {
                Some(t) => transcripts.push((id.clone(), t.text)),
                None => {
                    missing.insert(id.clone());
                }
            }
        }

        // With no transcript text there is nothing to prompt with; skip the
        // backend entirely and create no Generation row.
        if transcripts.is_empty() {
            info!("No transcriptions available for any requested video");
            return Ok(summarize(video_ids, &missing, &[], None));
        }

        let sections = build_transcript_sections(&transcripts, PROMPT_CHAR_BUDGET);

        let mut vars = HashMap::new();
        vars.insert("count".to_string(), count.to_string());
        vars.insert("transcripts".to_string(), sections);
        let user_prompt = Prompts::render(&self.prompts.questions.user, &vars);

        let content = self
            .call_llm(&self.prompts.questions.system, &user_prompt)
            .await
            .map_err(|e| KvissError::LlmUnavailable(e.to_string()))?;

        let requested_set: HashSet<String> = video_ids.iter().cloned().collect();
        let mut questions = parse_questions(&content, &requested_set);
        debug!("Parsed {} valid question(s)", questions.len());
        questions.truncate(count as usize);

        let generation = store.create_generation(video_ids, &questions)?;

        info!(
            "Generation {} created with {} question(s) over {} video(s)",
            generation.id,
            questions.len(),
            transcripts.len()
        );

        Ok(summarize(
            video_ids,
            &missing,
            &questions,
            Some(generation.id),
        ))
    }

    async fn call_llm(&self, system: &str, user: &str) -> Result<String> {
        let response = with_retry(&self.retry, "question generation", || async {
            let messages: Vec<ChatCompletionRequestMessage> = vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.to_string())
                    .build()
                    .map_err(|e| KvissError::OpenAI(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user.to_string())
                    .build()
                    .map_err(|e| KvissError::OpenAI(e.to_string()))?
                    .into(),
            ];

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages)
                .temperature(0.7)
                .build()
                .map_err(|e| KvissError::OpenAI(e.to_string()))?;

            self.client
                .chat()
                .create(request)
                .await
                .map_err(|e| map_openai_err(e, "LLM backend"))
        })
        .await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Concatenate transcripts into prompt sections, giving each video an equal
/// share of the character budget, truncated from the end.
fn build_transcript_sections(transcripts: &[(String, String)], budget: usize) -> String {
    let share = (budget / transcripts.len()).max(1);

    let mut out = String::new();
    for (id, text) in transcripts {
        out.push_str(&format!("### Video {}\n", id));
        if text.chars().count() > share {
            out.extend(text.chars().take(share));
        } else {
            out.push_str(text);
        }
        out.push_str("\n\n");
    }
    out
}

fn summarize(
    video_ids: &[String],
    missing: &HashSet<String>,
    questions: &[crate::store::NewQuestion],
    generation_id: Option<i64>,
) -> GenerationSummary {
    let contributed: HashSet<&str> = questions.iter().map(|q| q.video_id.as_str()).collect();

    let results: Vec<GenerateItemResult> = video_ids
        .iter()
        .map(|id| {
            let (status, message) = if missing.contains(id) {
                (
                    GenerateItemStatus::NoTranscription,
                    Some("No transcription exists for this video".to_string()),
                )
            } else if contributed.contains(id.as_str()) {
                (GenerateItemStatus::Success, None)
            } else {
                (
                    GenerateItemStatus::Failed,
                    Some("No valid questions referenced this video".to_string()),
                )
            };
            GenerateItemResult {
                video_id: id.clone(),
                status,
                message,
            }
        })
        .collect();

    let successful = results
        .iter()
        .filter(|r| r.status == GenerateItemStatus::Success)
        .count();
    let no_transcription = results
        .iter()
        .filter(|r| r.status == GenerateItemStatus::NoTranscription)
        .count();
    let failed = results
        .iter()
        .filter(|r| r.status == GenerateItemStatus::Failed)
        .count();

    GenerationSummary {
        total: video_ids.len(),
        successful,
        failed,
        no_transcription,
        total_questions: questions.len(),
        generation_id,
        results,
    }
}
