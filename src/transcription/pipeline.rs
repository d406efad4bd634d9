//! Transcription pipeline: locate → prepare → transcribe → embed → persist.
//!
//! Works chunk-by-chunk in index order when chunks exist, invoking the
//! chunker on demand for files over the provider limit. A chunk that fails
//! all retries voids the whole transcription; partial text is never
//! persisted.

use super::TranscriptionBackend;
use crate::chunking::AudioChunker;
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{KvissError, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{Store, Video};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Pipeline stages: locate, prepare, transcribe, embed, persist.
pub const TOTAL_STEPS: u8 = 5;

/// Per-video outcome of a transcription run. Failures are data, not errors;
/// the batch layer reports them in-band.
#[derive(Debug)]
pub enum TranscribeOutcome {
    Success {
        transcription_id: i64,
        steps_completed: u8,
    },
    NotFound,
    NoAudio,
    Failed {
        message: String,
        steps_completed: u8,
    },
}

enum AudioSource {
    Whole(PathBuf),
    Chunks(Vec<PathBuf>),
}

/// Orchestrates one video's transcription end to end.
pub struct TranscriptionPipeline {
    backend: Arc<dyn TranscriptionBackend>,
    embedder: Arc<dyn Embedder>,
    chunker: AudioChunker,
    retry: RetryPolicy,
    default_language: Option<String>,
}

impl TranscriptionPipeline {
    pub fn new(
        settings: &Settings,
        backend: Arc<dyn TranscriptionBackend>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            backend,
            embedder,
            chunker: AudioChunker::new(settings),
            retry: RetryPolicy::default(),
            default_language: settings.transcription.language.clone(),
        }
    }

    /// Transcribe one video. Either a new Transcription row is persisted or
    /// the store is left unchanged.
    #[instrument(skip(self, store, language), fields(video = %external_id))]
    pub async fn transcribe_video(
        &self,
        store: &Store,
        external_id: &str,
        language: Option<&str>,
    ) -> TranscribeOutcome {
        // Locate.
        let video = match store.get_video_by_external_id(external_id) {
            Ok(Some(video)) => video,
            Ok(None) => return TranscribeOutcome::NotFound,
            Err(e) => {
                return TranscribeOutcome::Failed {
                    message: e.to_string(),
                    steps_completed: 0,
                }
            }
        };
        let mut steps_completed = 1;

        // Prepare: pick chunk files or the original, chunking on demand.
        let source = match self.prepare(store, &video).await {
            Ok(Some(source)) => source,
            Ok(None) => return TranscribeOutcome::NoAudio,
            Err(e) => {
                return TranscribeOutcome::Failed {
                    message: e.to_string(),
                    steps_completed,
                }
            }
        };
        steps_completed = 2;

        // Transcribe.
        let language = language.or(self.default_language.as_deref());
        let text = match self.transcribe_source(&source, language).await {
            Ok(text) => text,
            Err(e) => {
                return TranscribeOutcome::Failed {
                    message: e.to_string(),
                    steps_completed,
                }
            }
        };
        steps_completed = 3;

        // Embed. A failed embedding is not fatal; the row is stored with a
        // null vector.
        let (embedding, status) = match self.embedder.embed(&text).await {
            Ok(vector) => {
                steps_completed = 4;
                (Some(vector), "completed")
            }
            Err(e) => {
                warn!("Embedding failed for {}: {}", external_id, e);
                (None, "completed_no_embedding")
            }
        };

        // Persist.
        match store.insert_transcription(external_id, &text, embedding.as_deref(), status) {
            Ok(transcription) => {
                steps_completed += 1;
                info!(
                    "Transcribed {} ({} chars, status {})",
                    external_id,
                    text.len(),
                    status
                );
                TranscribeOutcome::Success {
                    transcription_id: transcription.id,
                    steps_completed,
                }
            }
            Err(e) => TranscribeOutcome::Failed {
                message: e.to_string(),
                steps_completed,
            },
        }
    }

    /// Decide what to feed the backend. Returns None when the video has no
    /// usable audio.
    async fn prepare(&self, store: &Store, video: &Video) -> Result<Option<AudioSource>> {
        let chunks = store.chunks_for_video(video.id)?;
        if !chunks.is_empty() {
            let paths = chunks.iter().map(|c| PathBuf::from(&c.file_path)).collect();
            return Ok(Some(AudioSource::Chunks(paths)));
        }

        let audio_path = match &video.audio_path {
            Some(path) => PathBuf::from(path),
            None => return Ok(None),
        };
        if !audio_path.exists() {
            return Ok(None);
        }

        if let Some(limit) = self.backend.max_file_bytes() {
            let size = tokio::fs::metadata(&audio_path).await?.len();
            if size > limit {
                let chunks = self.chunker.chunk_video(store, video).await?;
                if !chunks.is_empty() {
                    let paths = chunks.iter().map(|c| PathBuf::from(&c.file_path)).collect();
                    return Ok(Some(AudioSource::Chunks(paths)));
                }
            }
        }

        Ok(Some(AudioSource::Whole(audio_path)))
    }

    /// Transcribe all pieces sequentially, joining texts in chunk order.
    async fn transcribe_source(
        &self,
        source: &AudioSource,
        language: Option<&str>,
    ) -> Result<String> {
        match source {
            AudioSource::Whole(path) => self.transcribe_one(path, language).await,
            AudioSource::Chunks(paths) => {
                let mut texts = Vec::with_capacity(paths.len());
                for (index, path) in paths.iter().enumerate() {
                    let text = self.transcribe_one(path, language).await.map_err(|e| {
                        KvissError::TranscriptionFailed(format!("Chunk {} failed: {}", index, e))
                    })?;
                    texts.push(text);
                }
                Ok(texts.join(" "))
            }
        }
    }

    async fn transcribe_one(&self, path: &Path, language: Option<&str>) -> Result<String> {
        with_retry(&self.retry, "transcription", || {
            self.backend.transcribe_file(path, language)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_norm;
    use crate::store::{DownloadStatus, NewChunk, NewVideo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoBackend {
        limit: Option<u64>,
        fail_always: bool,
        calls: AtomicU32,
    }

    impl EchoBackend {
        fn new(limit: Option<u64>) -> Self {
            Self {
                limit,
                fail_always: false,
                calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                limit: None,
                fail_always: true,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscriptionBackend for EchoBackend {
        async fn transcribe_file(
            &self,
            audio_path: &Path,
            _language: Option<&str>,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_always {
                return Err(KvissError::TranscriptionFailed("decode error".into()));
            }
            Ok(format!(
                "text:{}",
                audio_path.file_stem().unwrap().to_string_lossy()
            ))
        }

        fn max_file_bytes(&self) -> Option<u64> {
            self.limit
        }
    }

    struct FixedEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(KvissError::EmbeddingFailed("model offline".into()));
            }
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    fn pipeline(backend: EchoBackend, embed_fail: bool) -> TranscriptionPipeline {
        let mut settings = Settings::default();
        settings.storage.storage_path = "/tmp/kviss-test-storage".to_string();
        TranscriptionPipeline::new(
            &settings,
            Arc::new(backend),
            Arc::new(FixedEmbedder { fail: embed_fail }),
        )
    }

    fn seed_video(store: &Store, external_id: &str, audio_path: Option<String>) {
        store
            .insert_video(&NewVideo {
                external_id: external_id.to_string(),
                title: "t".to_string(),
                thumbnail_url: None,
                audio_path,
                download_status: DownloadStatus::Completed,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_success_all_steps() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("aaaaaaaaaaa.mp3");
        std::fs::write(&audio, b"fake audio").unwrap();

        let store = Store::in_memory(4).unwrap();
        seed_video(
            &store,
            "aaaaaaaaaaa",
            Some(audio.to_string_lossy().to_string()),
        );

        let outcome = pipeline(EchoBackend::new(None), false)
            .transcribe_video(&store, "aaaaaaaaaaa", None)
            .await;

        match outcome {
            TranscribeOutcome::Success {
                transcription_id,
                steps_completed,
            } => {
                assert_eq!(steps_completed, TOTAL_STEPS);
                let t = store.get_transcription(transcription_id).unwrap().unwrap();
                assert_eq!(t.text, "text:aaaaaaaaaaa");
                assert_eq!(t.status, "completed");
                let v = t.embedding.unwrap();
                assert!((l2_norm(&v) - 1.0).abs() < 1e-4);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let store = Store::in_memory(4).unwrap();
        let outcome = pipeline(EchoBackend::new(None), false)
            .transcribe_video(&store, "missing00000", None)
            .await;
        assert!(matches!(outcome, TranscribeOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_missing_audio_is_no_audio() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "ccccccccccc", None);

        let outcome = pipeline(EchoBackend::new(None), false)
            .transcribe_video(&store, "ccccccccccc", None)
            .await;
        assert!(matches!(outcome, TranscribeOutcome::NoAudio));

        // A recorded path whose file vanished is also unusable.
        seed_video(
            &store,
            "ddddddddddd",
            Some("/nonexistent/ddddddddddd.mp3".to_string()),
        );
        let outcome = pipeline(EchoBackend::new(None), false)
            .transcribe_video(&store, "ddddddddddd", None)
            .await;
        assert!(matches!(outcome, TranscribeOutcome::NoAudio));
    }

    #[tokio::test]
    async fn test_chunked_video_concatenates_in_order() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "bbbbbbbbbbb", Some("/tmp/unused.mp3".to_string()));
        let video = store.get_video_by_external_id("bbbbbbbbbbb").unwrap().unwrap();

        store
            .insert_chunks(
                video.id,
                &[
                    NewChunk {
                        chunk_index: 0,
                        file_path: "/tmp/chunk_a.mp3".to_string(),
                        size_bytes: 1,
                        start_ms: 0,
                        end_ms: 1000,
                    },
                    NewChunk {
                        chunk_index: 1,
                        file_path: "/tmp/chunk_b.mp3".to_string(),
                        size_bytes: 1,
                        start_ms: 1000,
                        end_ms: 2000,
                    },
                ],
            )
            .unwrap();

        let outcome = pipeline(EchoBackend::new(None), false)
            .transcribe_video(&store, "bbbbbbbbbbb", None)
            .await;

        match outcome {
            TranscribeOutcome::Success {
                transcription_id, ..
            } => {
                let t = store.get_transcription(transcription_id).unwrap().unwrap();
                // Single-space join, chunk index order.
                assert_eq!(t.text, "text:chunk_a text:chunk_b");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_failure_persists_without_vector() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("aaaaaaaaaaa.mp3");
        std::fs::write(&audio, b"fake audio").unwrap();

        let store = Store::in_memory(4).unwrap();
        seed_video(
            &store,
            "aaaaaaaaaaa",
            Some(audio.to_string_lossy().to_string()),
        );

        let outcome = pipeline(EchoBackend::new(None), true)
            .transcribe_video(&store, "aaaaaaaaaaa", None)
            .await;

        match outcome {
            TranscribeOutcome::Success {
                transcription_id,
                steps_completed,
            } => {
                // Embed step was skipped.
                assert_eq!(steps_completed, TOTAL_STEPS - 1);
                let t = store.get_transcription(transcription_id).unwrap().unwrap();
                assert_eq!(t.status, "completed_no_embedding");
                assert!(t.embedding.is_none());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backend_failure_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("aaaaaaaaaaa.mp3");
        std::fs::write(&audio, b"fake audio").unwrap();

        let store = Store::in_memory(4).unwrap();
        seed_video(
            &store,
            "aaaaaaaaaaa",
            Some(audio.to_string_lossy().to_string()),
        );

        let outcome = pipeline(EchoBackend::failing(), false)
            .transcribe_video(&store, "aaaaaaaaaaa", None)
            .await;

        match outcome {
            TranscribeOutcome::Failed {
                steps_completed, ..
            } => {
                assert_eq!(steps_completed, 2);
                assert!(store
                    .transcriptions_for_video("aaaaaaaaaaa")
                    .unwrap()
                    .is_empty());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
