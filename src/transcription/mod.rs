//! Speech-to-text transcription.
//!
//! Polymorphic over providers: a hosted Whisper-style API with a per-request
//! size limit, or a local single-threaded inference runtime. The pipeline
//! layer orchestrates chunked transcription, retries, embedding, and
//! persistence on top of either backend.

mod local;
mod pipeline;
mod remote;

pub use local::LocalServerTranscriber;
pub use pipeline::{TranscribeOutcome, TranscriptionPipeline, TOTAL_STEPS};
pub use remote::RemoteApiTranscriber;

use crate::config::{Settings, TranscriptionProvider};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for transcription providers.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe one audio file to plain text. The language hint passes
    /// through to the provider unchanged.
    async fn transcribe_file(&self, audio_path: &Path, language: Option<&str>) -> Result<String>;

    /// Per-request file size limit, if the provider has one.
    fn max_file_bytes(&self) -> Option<u64>;
}

/// Select a backend from configuration.
pub fn create_backend(settings: &Settings) -> Arc<dyn TranscriptionBackend> {
    match settings.transcription.provider {
        TranscriptionProvider::Local => Arc::new(LocalServerTranscriber::new(
            &settings.transcription.base_url,
            &settings.transcription.model,
        )),
        TranscriptionProvider::Remote => Arc::new(RemoteApiTranscriber::new(
            &settings.transcription.model,
            settings.chunk_threshold_bytes(),
        )),
    }
}
