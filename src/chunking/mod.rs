//! Audio chunking for oversized artifacts.
//!
//! Splits an original audio file at silence boundaries into slices that fit
//! a provider's per-request size limit. Slices are cut in stream-copy mode
//! (no re-encode) and persisted all-or-nothing; a failure mid-way removes
//! every partial file.

pub mod plan;
pub mod silence;

use crate::config::Settings;
use crate::error::{KvissError, Result};
use crate::media::{probe, process::run_tool, remove_files_best_effort};
use crate::store::{AudioChunk, NewChunk, Store, Video};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Wall-clock limit per FFmpeg invocation.
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Splits oversized audio files at silence boundaries.
pub struct AudioChunker {
    audio_dir: PathBuf,
    threshold_bytes: u64,
    noise_floor_db: f64,
    min_silence_s: f64,
    delete_original: bool,
}

impl AudioChunker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            audio_dir: settings.audio_dir(),
            threshold_bytes: settings.chunk_threshold_bytes(),
            noise_floor_db: settings.chunking.silence_threshold_db,
            min_silence_s: settings.chunking.min_silence_duration_s,
            delete_original: settings.chunking.delete_original_after_chunking,
        }
    }

    /// Split a video's audio if it exceeds the size threshold.
    ///
    /// Idempotent: existing chunks are returned as-is. Returns an empty list
    /// when the file fits under the threshold (the caller uses the original).
    #[instrument(skip(self, store, video), fields(video = %video.external_id))]
    pub async fn chunk_video(&self, store: &Store, video: &Video) -> Result<Vec<AudioChunk>> {
        let existing = store.chunks_for_video(video.id)?;
        if !existing.is_empty() {
            info!(
                "Video {} already has {} chunks, skipping",
                video.external_id,
                existing.len()
            );
            return Ok(existing);
        }

        let audio_path = video.audio_path.as_deref().ok_or_else(|| {
            KvissError::ChunkingFailed(format!("Video {} has no audio file", video.external_id))
        })?;
        let source = Path::new(audio_path);

        let file_size = probe::file_size_bytes(source).await?;
        if file_size <= self.threshold_bytes {
            return Ok(Vec::new());
        }

        let duration_s = probe::duration_seconds(source).await?;
        let duration_ms = (duration_s * 1000.0) as u64;

        let midpoints = silence::detect_silence_midpoints(
            source,
            self.noise_floor_db,
            self.min_silence_s,
            FFMPEG_TIMEOUT,
        )
        .await?;

        let target_ms = plan::target_chunk_ms(duration_ms, file_size, self.threshold_bytes);
        let segments = plan::plan_segments(duration_ms, target_ms, &midpoints);

        info!(
            "Splitting {} ({} bytes, {:.0}s) into {} chunks",
            video.external_id,
            file_size,
            duration_s,
            segments.len()
        );

        let chunk_dir = self.audio_dir.join("chunks").join(&video.external_id);
        std::fs::create_dir_all(&chunk_dir)?;

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_string();

        let mut new_chunks = Vec::with_capacity(segments.len());
        let mut created_files: Vec<PathBuf> = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            let chunk_path = chunk_dir.join(format!(
                "{}_chunk_{:03}.{}",
                video.external_id, index, extension
            ));

            if let Err(e) = self
                .cut_segment(source, &chunk_path, segment.start_ms, segment.duration_ms())
                .await
            {
                self.cleanup_partial(&created_files, &chunk_dir);
                return Err(e);
            }
            created_files.push(chunk_path.clone());

            let size_bytes = probe::file_size_bytes(&chunk_path).await.unwrap_or(0);
            new_chunks.push(NewChunk {
                chunk_index: index as i64,
                file_path: chunk_path.to_string_lossy().to_string(),
                size_bytes: size_bytes as i64,
                start_ms: segment.start_ms as i64,
                end_ms: segment.end_ms as i64,
            });
        }

        let chunks = match store.insert_chunks(video.id, &new_chunks) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.cleanup_partial(&created_files, &chunk_dir);
                return Err(e);
            }
        };

        if self.delete_original {
            let removed = remove_files_best_effort(&[source.to_path_buf()]);
            if removed == 1 {
                info!("Removed original audio for {}", video.external_id);
            }
        }

        Ok(chunks)
    }

    /// Cut one slice in stream-copy mode.
    async fn cut_segment(
        &self,
        source: &Path,
        dest: &Path,
        start_ms: u64,
        duration_ms: u64,
    ) -> Result<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-ss")
            .arg(format!("{:.3}", start_ms as f64 / 1000.0))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", duration_ms as f64 / 1000.0))
            .arg("-c")
            .arg("copy")
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg(dest);

        let output = run_tool(cmd, "ffmpeg", FFMPEG_TIMEOUT).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KvissError::ChunkingFailed(format!(
                "Segment extraction failed: {}",
                stderr.trim()
            )));
        }
        if !dest.exists() {
            return Err(KvissError::ChunkingFailed(format!(
                "Segment file missing after extraction: {:?}",
                dest
            )));
        }

        Ok(())
    }

    fn cleanup_partial(&self, files: &[PathBuf], chunk_dir: &Path) {
        warn!("Cleaning up {} partial chunk file(s)", files.len());
        remove_files_best_effort(files);
        let _ = std::fs::remove_dir(chunk_dir);
    }
}
