//! Local inference runtime backend (whisper.cpp server).

use super::TranscriptionBackend;
use crate::error::{KvissError, Result};
use async_trait::async_trait;
use reqwest::multipart;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Local inference can chew through a whole file in one request; allow it
/// the same wall clock as a full download.
const INFERENCE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Transcriber backed by a whisper.cpp-style server on localhost.
///
/// The runtime runs inference single-threaded and is not re-entrant, so
/// requests are serialized behind a mutex. Whole files are accepted without
/// a size limit; memory stays bounded because only one inference runs at a
/// time.
pub struct LocalServerTranscriber {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    // Guards the runtime, not our own state.
    serialize: Mutex<()>,
}

impl LocalServerTranscriber {
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(INFERENCE_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: format!("{}/inference", base_url.trim_end_matches('/')),
            model: model.to_string(),
            serialize: Mutex::new(()),
        }
    }
}

#[derive(serde::Deserialize)]
struct InferenceResponse {
    text: String,
}

#[async_trait]
impl TranscriptionBackend for LocalServerTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_file(&self, audio_path: &Path, language: Option<&str>) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mut form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(file_bytes)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")
                    .map_err(|e| KvissError::TranscriptionFailed(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "json");

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let _guard = self.serialize.lock().await;
        debug!("Sending inference request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!(
                "Local runtime returned {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            );
            return if status.is_server_error()
                || status.as_u16() == 408
                || status.as_u16() == 429
            {
                Err(KvissError::ProviderUnavailable(message))
            } else {
                Err(KvissError::TranscriptionFailed(message))
            };
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| KvissError::TranscriptionFailed(format!("Invalid response: {}", e)))?;

        Ok(parsed.text.trim().to_string())
    }

    fn max_file_bytes(&self) -> Option<u64> {
        None
    }
}
