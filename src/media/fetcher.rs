//! Media fetcher: resolves a URL to a canonical video id, metadata, and an
//! audio artifact on disk.

use super::process::run_tool;
use super::{DOWNLOAD_TIMEOUT, TOOL_TIMEOUT};
use crate::config::{AudioFormat, Settings};
use crate::error::{KvissError, Result};
use crate::store::{DownloadStatus, NewVideo, Store, Video};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{info, instrument};
use url::Url;

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("Invalid regex"))
}

/// Extract the 11-character external id from a URL or bare id.
///
/// Accepted forms: `watch?v=`, `youtu.be/`, `shorts/`, `embed/`, `v/`, and a
/// bare id.
pub fn extract_external_id(input: &str) -> Option<String> {
    let trimmed = input.trim();

    if id_regex().is_match(trimmed) {
        return Some(trimmed.to_string());
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").to_string();

    let candidate = match host.as_str() {
        "youtu.be" => parsed.path_segments()?.next().map(|s| s.to_string()),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            let mut segments = parsed.path_segments()?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.to_string()),
                Some("shorts") | Some("embed") | Some("v") => {
                    segments.next().map(|s| s.to_string())
                }
                _ => None,
            }
        }
        _ => None,
    }?;

    id_regex().is_match(&candidate).then_some(candidate)
}

/// Outcome of a fetch: a freshly downloaded video or an already-known one.
#[derive(Debug)]
pub enum FetchOutcome {
    Downloaded(Video),
    Duplicate(Video),
}

/// Resolves URLs and materializes audio artifacts through yt-dlp.
pub struct MediaFetcher {
    audio_dir: PathBuf,
    format: AudioFormat,
}

impl MediaFetcher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            audio_dir: settings.audio_dir(),
            format: settings.storage.audio_format,
        }
    }

    /// Resolve `url`, download its audio, and insert a Video row.
    ///
    /// No Video row is created when the download fails; an id already present
    /// in the store short-circuits to Duplicate without touching the network.
    #[instrument(skip(self, store), fields(url = %url))]
    pub async fn fetch(&self, store: &Store, url: &str) -> Result<FetchOutcome> {
        let external_id = extract_external_id(url)
            .ok_or_else(|| KvissError::InvalidUrl(format!("Could not parse video URL: {}", url)))?;

        if let Some(existing) = store.get_video_by_external_id(&external_id)? {
            info!("Video {} already exists, skipping download", external_id);
            return Ok(FetchOutcome::Duplicate(existing));
        }

        let canonical_url = format!("https://www.youtube.com/watch?v={}", external_id);
        let (title, thumbnail_url) = self.fetch_metadata(&canonical_url, &external_id).await?;

        let audio_path = self.download_audio(&canonical_url, &external_id).await?;

        let video = match store.insert_video(&NewVideo {
            external_id: external_id.clone(),
            title,
            thumbnail_url,
            audio_path: Some(audio_path.to_string_lossy().to_string()),
            download_status: DownloadStatus::Completed,
        }) {
            Ok(video) => video,
            // Lost a race with a concurrent download of the same id; the
            // artifact path is identical either way.
            Err(KvissError::Duplicate(_)) => {
                let existing = store
                    .get_video_by_external_id(&external_id)?
                    .ok_or_else(|| KvissError::NotFound(format!("Video {}", external_id)))?;
                return Ok(FetchOutcome::Duplicate(existing));
            }
            Err(e) => return Err(e),
        };

        info!("Downloaded {} to {:?}", external_id, audio_path);
        Ok(FetchOutcome::Downloaded(video))
    }

    /// Fetch title and thumbnail via yt-dlp without downloading.
    async fn fetch_metadata(
        &self,
        url: &str,
        external_id: &str,
    ) -> Result<(String, Option<String>)> {
        let mut cmd = Command::new("yt-dlp");
        cmd.arg("--dump-json")
            .arg("--no-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url);

        let output = run_tool(cmd, "yt-dlp", TOOL_TIMEOUT).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KvissError::RemoteFailure(format!(
                "Video {} not found or unavailable: {}",
                external_id,
                stderr.trim()
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str).map_err(|e| {
            KvissError::RemoteFailure(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        let title = json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string();
        let thumbnail = json["thumbnail"].as_str().map(|s| s.to_string());

        Ok((title, thumbnail))
    }

    /// Download best audio, transcoded to the configured format.
    async fn download_audio(&self, url: &str, external_id: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.audio_dir)?;

        let target_path = self
            .audio_dir
            .join(format!("{}.{}", external_id, self.format.extension()));

        if target_path.exists() {
            info!("Using cached audio file for {}", external_id);
            return Ok(target_path);
        }

        let template = self.audio_dir.join(format!("{}.%(ext)s", external_id));

        let mut cmd = Command::new("yt-dlp");
        cmd.arg("--extract-audio")
            .arg("--audio-format")
            .arg(self.format.extension())
            .arg("--audio-quality")
            .arg("0")
            .arg("--output")
            .arg(template.as_os_str())
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings");

        // WAV has no tag container; embedding is mp3-only.
        if self.format == AudioFormat::Mp3 {
            cmd.arg("--embed-metadata").arg("--embed-thumbnail");
        }

        cmd.arg(url);

        let output = run_tool(cmd, "yt-dlp", DOWNLOAD_TIMEOUT).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KvissError::RemoteFailure(format!(
                "yt-dlp failed: {}",
                stderr.trim()
            )));
        }

        if !target_path.exists() {
            return Err(KvissError::RemoteFailure(format!(
                "Audio file missing after download for {}",
                external_id
            )));
        }

        Ok(target_path)
    }
}
