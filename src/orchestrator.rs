//! Pipeline orchestrator.
//!
//! Coordinates batch execution of download, transcribe, and
//! question-generation operations. Items run strictly sequentially within a
//! batch; component failures are caught per item and reported in-band, so a
//! batch response is 200 even when every item failed.

use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::media::{FetchOutcome, MediaFetcher};
use crate::questions::{GenerationSummary, QuestionGenerator};
use crate::store::Store;
use crate::transcription::{
    create_backend, TranscribeOutcome, TranscriptionPipeline, TOTAL_STEPS,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

/// Run a batch sequentially, preserving input order in the results.
///
/// Sequential execution bounds peak resource use (one subprocess or model
/// invocation at a time) and keeps failure attribution unambiguous.
pub async fn run_batch<I, T, F, Fut>(items: Vec<I>, mut op: F) -> Vec<T>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = T>,
{
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(op(item).await);
    }
    results
}

/// Per-item outcome of a download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadItemStatus {
    Success,
    Duplicate,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct DownloadItemResult {
    pub url: String,
    pub status: DownloadItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadBatchSummary {
    pub results: Vec<DownloadItemResult>,
    pub total: usize,
    pub successful: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Per-item outcome of a transcribe batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscribeItemStatus {
    Success,
    NotFound,
    NoAudio,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct TranscribeItemResult {
    pub video_id: String,
    pub status: TranscribeItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_id: Option<i64>,
    pub steps_completed: u8,
    pub total_steps: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeBatchSummary {
    pub results: Vec<TranscribeItemResult>,
    pub total: usize,
    pub successful: usize,
    pub not_found: usize,
    pub no_audio: usize,
    pub failed: usize,
}

/// The service container wired up at startup and handed to the HTTP layer.
pub struct Orchestrator {
    store: Arc<Store>,
    fetcher: MediaFetcher,
    transcription: TranscriptionPipeline,
    questions: QuestionGenerator,
}

impl Orchestrator {
    pub fn new(settings: &Settings, store: Arc<Store>) -> Self {
        let backend = create_backend(settings);
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model_name,
            settings.embedding.dim as usize,
            settings.embedding.base_url.as_deref(),
        ));

        Self {
            fetcher: MediaFetcher::new(settings),
            transcription: TranscriptionPipeline::new(settings, backend, embedder),
            questions: QuestionGenerator::new(settings),
            store,
        }
    }

    /// Assemble an orchestrator from pre-built components.
    pub fn with_components(
        store: Arc<Store>,
        fetcher: MediaFetcher,
        transcription: TranscriptionPipeline,
        questions: QuestionGenerator,
    ) -> Self {
        Self {
            store,
            fetcher,
            transcription,
            questions,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Download a batch of URLs.
    #[instrument(skip(self, urls), fields(total = urls.len()))]
    pub async fn download_batch(&self, urls: Vec<String>) -> DownloadBatchSummary {
        let this = &*self;
        let results = run_batch(urls, |url| this.download_one(url)).await;

        let successful = count_download(&results, DownloadItemStatus::Success);
        let duplicates = count_download(&results, DownloadItemStatus::Duplicate);
        let failed = count_download(&results, DownloadItemStatus::Failed);

        DownloadBatchSummary {
            total: results.len(),
            successful,
            duplicates,
            failed,
            results,
        }
    }

    async fn download_one(&self, url: String) -> DownloadItemResult {
        match self.fetcher.fetch(&self.store, &url).await {
            Ok(FetchOutcome::Downloaded(video)) => DownloadItemResult {
                url,
                status: DownloadItemStatus::Success,
                video_id: Some(video.external_id),
                title: Some(video.title),
                message: None,
            },
            Ok(FetchOutcome::Duplicate(video)) => DownloadItemResult {
                url,
                status: DownloadItemStatus::Duplicate,
                video_id: Some(video.external_id),
                title: Some(video.title),
                message: Some("Video already exists".to_string()),
            },
            Err(e) => DownloadItemResult {
                url,
                status: DownloadItemStatus::Failed,
                video_id: None,
                title: None,
                message: Some(e.to_string()),
            },
        }
    }

    /// Transcribe a batch of videos by external id.
    #[instrument(skip(self, video_ids, language), fields(total = video_ids.len()))]
    pub async fn transcribe_batch(
        &self,
        video_ids: Vec<String>,
        language: Option<String>,
    ) -> TranscribeBatchSummary {
        let this = &*self;
        let language = language.as_deref();
        let results = run_batch(video_ids, |id| this.transcribe_one(id, language)).await;

        let successful = count_transcribe(&results, TranscribeItemStatus::Success);
        let not_found = count_transcribe(&results, TranscribeItemStatus::NotFound);
        let no_audio = count_transcribe(&results, TranscribeItemStatus::NoAudio);
        let failed = count_transcribe(&results, TranscribeItemStatus::Failed);

        TranscribeBatchSummary {
            total: results.len(),
            successful,
            not_found,
            no_audio,
            failed,
            results,
        }
    }

    async fn transcribe_one(&self, video_id: String, language: Option<&str>) -> TranscribeItemResult {
        let outcome = self
            .transcription
            .transcribe_video(&self.store, &video_id, language)
            .await;

        match outcome {
            TranscribeOutcome::Success {
                transcription_id,
                steps_completed,
            } => TranscribeItemResult {
                video_id,
                status: TranscribeItemStatus::Success,
                transcription_id: Some(transcription_id),
                steps_completed,
                total_steps: TOTAL_STEPS,
                message: None,
            },
            TranscribeOutcome::NotFound => TranscribeItemResult {
                video_id,
                status: TranscribeItemStatus::NotFound,
                transcription_id: None,
                steps_completed: 0,
                total_steps: TOTAL_STEPS,
                message: Some("Video not found".to_string()),
            },
            TranscribeOutcome::NoAudio => TranscribeItemResult {
                video_id,
                status: TranscribeItemStatus::NoAudio,
                transcription_id: None,
                steps_completed: 1,
                total_steps: TOTAL_STEPS,
                message: Some("Video has no audio file".to_string()),
            },
            TranscribeOutcome::Failed {
                message,
                steps_completed,
            } => TranscribeItemResult {
                video_id,
                status: TranscribeItemStatus::Failed,
                transcription_id: None,
                steps_completed,
                total_steps: TOTAL_STEPS,
                message: Some(message),
            },
        }
    }

    /// Generate questions over a set of videos.
    pub async fn generate_questions(
        &self,
        video_ids: &[String],
        count: u32,
    ) -> Result<GenerationSummary> {
        self.questions.generate(&self.store, video_ids, count).await
    }
}

fn count_download(results: &[DownloadItemResult], status: DownloadItemStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

fn count_transcribe(results: &[TranscribeItemResult], status: TranscribeItemStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::error::KvissError;
    use crate::questions::GenerateItemStatus;
    use crate::store::{DownloadStatus, NewVideo};
    use crate::transcription::TranscriptionBackend;
    use async_trait::async_trait;
    use std::path::Path;

    struct StaticBackend;

    #[async_trait]
    impl TranscriptionBackend for StaticBackend {
        async fn transcribe_file(
            &self,
            _audio_path: &Path,
            _language: Option<&str>,
        ) -> crate::error::Result<String> {
            Ok("hello world".to_string())
        }

        fn max_file_bytes(&self) -> Option<u64> {
            None
        }
    }

    struct StaticEmbedder;

    #[async_trait]
    impl Embedder for StaticEmbedder {
        async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
            Err(KvissError::EmbeddingFailed("offline".into()))
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    fn orchestrator(store: Arc<Store>) -> Orchestrator {
        let mut settings = Settings::default();
        settings.storage.storage_path = "/tmp/kviss-test-storage".to_string();

        Orchestrator::with_components(
            store,
            MediaFetcher::new(&settings),
            TranscriptionPipeline::new(
                &settings,
                Arc::new(StaticBackend),
                Arc::new(StaticEmbedder),
            ),
            QuestionGenerator::new(&settings),
        )
    }

    #[tokio::test]
    async fn test_run_batch_preserves_order() {
        let results = run_batch(vec![3u32, 1, 2], |n| async move { n * 10 }).await;
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_download_batch_duplicate_and_failed() {
        let store = Arc::new(Store::in_memory(4).unwrap());
        store
            .insert_video(&NewVideo {
                external_id: "aaaaaaaaaaa".to_string(),
                title: "Known".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Completed,
            })
            .unwrap();

        let orch = orchestrator(store);
        let summary = orch
            .download_batch(vec![
                "https://youtu.be/aaaaaaaaaaa".to_string(),
                "definitely not a url".to_string(),
            ])
            .await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.failed, 1);

        // Input order survives.
        assert_eq!(summary.results[0].status, DownloadItemStatus::Duplicate);
        assert_eq!(
            summary.results[0].video_id.as_deref(),
            Some("aaaaaaaaaaa")
        );
        assert_eq!(summary.results[1].status, DownloadItemStatus::Failed);
        assert!(summary.results[1].message.is_some());
    }

    #[tokio::test]
    async fn test_generate_without_any_transcription_creates_no_generation() {
        let store = Arc::new(Store::in_memory(4).unwrap());
        // One known video without a transcription, one unknown id.
        store
            .insert_video(&NewVideo {
                external_id: "aaaaaaaaaaa".to_string(),
                title: "Untranscribed".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Completed,
            })
            .unwrap();

        let orch = orchestrator(store.clone());
        let summary = orch
            .generate_questions(
                &["aaaaaaaaaaa".to_string(), "missing00000".to_string()],
                5,
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.no_transcription, 2);
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.generation_id, None);
        assert!(summary
            .results
            .iter()
            .all(|r| r.status == GenerateItemStatus::NoTranscription));

        // The backend was never consulted and no row was created.
        assert_eq!(store.count_generations().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transcribe_batch_mixed_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("aaaaaaaaaaa.mp3");
        std::fs::write(&audio, b"fake audio").unwrap();

        let store = Arc::new(Store::in_memory(4).unwrap());
        store
            .insert_video(&NewVideo {
                external_id: "aaaaaaaaaaa".to_string(),
                title: "With audio".to_string(),
                thumbnail_url: None,
                audio_path: Some(audio.to_string_lossy().to_string()),
                download_status: DownloadStatus::Completed,
            })
            .unwrap();
        store
            .insert_video(&NewVideo {
                external_id: "ccccccccccc".to_string(),
                title: "No audio".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Failed,
            })
            .unwrap();

        let orch = orchestrator(store.clone());
        let summary = orch
            .transcribe_batch(
                vec![
                    "aaaaaaaaaaa".to_string(),
                    "missing00000".to_string(),
                    "ccccccccccc".to_string(),
                ],
                None,
            )
            .await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.no_audio, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(summary.results[0].status, TranscribeItemStatus::Success);
        assert_eq!(summary.results[1].status, TranscribeItemStatus::NotFound);
        assert_eq!(summary.results[2].status, TranscribeItemStatus::NoAudio);
        assert_eq!(summary.results[0].total_steps, TOTAL_STEPS);

        // The embedder was down, so the row landed without a vector.
        let t = store
            .latest_transcription_for_video("aaaaaaaaaaa")
            .unwrap()
            .unwrap();
        assert_eq!(t.status, "completed_no_embedding");
        assert_eq!(t.text, "hello world");
    }
}
