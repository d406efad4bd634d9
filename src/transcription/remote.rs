//! Hosted Whisper-style transcription API backend.

use super::TranscriptionBackend;
use crate::error::{KvissError, Result};
use crate::openai::{create_client, map_openai_err};
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

/// Transcriber backed by a hosted OpenAI-compatible audio API.
///
/// The API enforces a per-request upload limit; larger files must be chunked
/// before reaching this backend.
pub struct RemoteApiTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_file_bytes: u64,
}

impl RemoteApiTranscriber {
    pub fn new(model: &str, max_file_bytes: u64) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            max_file_bytes,
        }
    }
}

#[async_trait]
impl TranscriptionBackend for RemoteApiTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_file(&self, audio_path: &Path, language: Option<&str>) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path).await?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(file_name, file_bytes))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json);

        if let Some(lang) = language {
            request_builder.language(lang);
        }

        let request = request_builder.build().map_err(|e| {
            KvissError::TranscriptionFailed(format!("Failed to build request: {}", e))
        })?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| map_openai_err(e, "Transcription API"))?;

        debug!("Transcribed {} characters", response.text.len());
        Ok(response.text.trim().to_string())
    }

    fn max_file_bytes(&self) -> Option<u64> {
        Some(self.max_file_bytes)
    }
}
