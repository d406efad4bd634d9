//! Configuration settings for Kviss.

use crate::error::{KvissError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub chunking: ChunkingSettings,
    pub server: ServerSettings,
}

/// Storage locations and artifact format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database location. Accepts a plain path or a `sqlite://` DSN.
    pub database_url: String,
    /// Root directory for audio artifacts.
    pub storage_path: String,
    /// Target audio format for downloaded originals and chunks.
    pub audio_format: AudioFormat,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "~/.kviss/kviss.db".to_string(),
            storage_path: "~/.kviss/storage".to_string(),
            audio_format: AudioFormat::Mp3,
        }
    }
}

/// Audio container format for downloaded artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(format!("Unknown audio format: {}", s)),
        }
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Local single-threaded inference runtime (whisper.cpp server).
    #[default]
    Local,
    /// Hosted Whisper-style API with a per-request file size limit.
    Remote,
}

impl std::str::FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(TranscriptionProvider::Local),
            "remote" => Ok(TranscriptionProvider::Remote),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Local => write!(f, "local"),
            TranscriptionProvider::Remote => write!(f, "remote"),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Provider selection (local, remote).
    pub provider: TranscriptionProvider,
    /// Provider-specific model identifier.
    pub model: String,
    /// Base URL of the local inference runtime.
    pub base_url: String,
    /// Default language hint passed through to the provider.
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Local,
            model: "whisper-1".to_string(),
            base_url: "http://127.0.0.1:8080".to_string(),
            language: None,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model identifier.
    pub model_name: String,
    /// Embedding dimensions; must match the stored vector width.
    pub dim: u32,
    /// Optional OpenAI-compatible base URL override.
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_name: "text-embedding-3-small".to_string(),
            dim: 1536,
            base_url: None,
        }
    }
}

/// LLM backend settings for question generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    /// Model name to request.
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/v1".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

/// Audio chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Files larger than this are split before remote transcription.
    pub max_chunk_size_mb: u64,
    /// Noise floor for silence detection, in dB.
    pub silence_threshold_db: f64,
    /// Minimum silence duration to count as a boundary, in seconds.
    pub min_silence_duration_s: f64,
    /// Remove the original file once chunks are persisted.
    pub delete_original_after_chunking: bool,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_size_mb: 25,
            silence_threshold_db: -35.0,
            min_silence_duration_s: 0.3,
            delete_original_after_chunking: false,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// CORS allow-list; `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None.
    /// Environment variables override file values.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kviss")
            .join("config.toml")
    }

    /// Apply environment-variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Ok(v) = std::env::var("STORAGE_PATH") {
            self.storage.storage_path = v;
        }
        if let Ok(v) = std::env::var("AUDIO_FORMAT") {
            self.storage.audio_format = v.parse().map_err(KvissError::Config)?;
        }
        if let Ok(v) = std::env::var("TRANSCRIPTION_PROVIDER") {
            self.transcription.provider = v.parse().map_err(KvissError::Config)?;
        }
        if let Ok(v) = std::env::var("TRANSCRIPTION_MODEL") {
            self.transcription.model = v;
        }
        if let Ok(v) = std::env::var("TRANSCRIPTION_BASE_URL") {
            self.transcription.base_url = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_MODEL_NAME") {
            self.embedding.model_name = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIM") {
            self.embedding.dim = v
                .parse()
                .map_err(|_| KvissError::Config(format!("EMBEDDING_DIM is not a number: {}", v)))?;
        }
        if let Ok(v) = std::env::var("EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("MAX_CHUNK_SIZE_MB") {
            self.chunking.max_chunk_size_mb = v.parse().map_err(|_| {
                KvissError::Config(format!("MAX_CHUNK_SIZE_MB is not a number: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("SILENCE_THRESHOLD_DB") {
            self.chunking.silence_threshold_db = v.parse().map_err(|_| {
                KvissError::Config(format!("SILENCE_THRESHOLD_DB is not a number: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("MIN_SILENCE_DURATION_S") {
            self.chunking.min_silence_duration_s = v.parse().map_err(|_| {
                KvissError::Config(format!("MIN_SILENCE_DURATION_S is not a number: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("DELETE_ORIGINAL_AFTER_CHUNKING") {
            self.chunking.delete_original_after_chunking = matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Ok(v) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        Ok(())
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Database file path, with an optional `sqlite://` scheme stripped.
    pub fn database_path(&self) -> PathBuf {
        let raw = self
            .storage
            .database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.storage.database_url);
        Self::expand_path(raw)
    }

    /// Expanded storage root.
    pub fn storage_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.storage_path)
    }

    /// Directory holding original audio artifacts.
    pub fn audio_dir(&self) -> PathBuf {
        self.storage_path().join("audio")
    }

    /// Directory holding chunks for one video.
    pub fn chunks_dir(&self, external_id: &str) -> PathBuf {
        self.audio_dir().join("chunks").join(external_id)
    }

    /// Chunking threshold in bytes.
    pub fn chunk_threshold_bytes(&self) -> u64 {
        self.chunking.max_chunk_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.max_chunk_size_mb, 25);
        assert_eq!(settings.chunking.silence_threshold_db, -35.0);
        assert_eq!(settings.chunking.min_silence_duration_s, 0.3);
        assert!(!settings.chunking.delete_original_after_chunking);
        assert_eq!(settings.embedding.dim, 1536);
        assert_eq!(settings.transcription.provider, TranscriptionProvider::Local);
    }

    #[test]
    fn test_database_path_strips_scheme() {
        let mut settings = Settings::default();
        settings.storage.database_url = "sqlite:///tmp/kviss-test.db".to_string();
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/tmp/kviss-test.db")
        );

        settings.storage.database_url = "/tmp/plain.db".to_string();
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/plain.db"));
    }

    #[test]
    fn test_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [chunking]
            max_chunk_size_mb = 10

            [transcription]
            provider = "remote"
            "#,
        )
        .unwrap();

        assert_eq!(settings.chunking.max_chunk_size_mb, 10);
        assert_eq!(
            settings.transcription.provider,
            TranscriptionProvider::Remote
        );
        // Unspecified sections fall back to defaults.
        assert_eq!(settings.embedding.dim, 1536);
    }

    #[test]
    fn test_chunk_paths() {
        let mut settings = Settings::default();
        settings.storage.storage_path = "/data".to_string();
        assert_eq!(settings.audio_dir(), PathBuf::from("/data/audio"));
        assert_eq!(
            settings.chunks_dir("dQw4w9WgXcQ"),
            PathBuf::from("/data/audio/chunks/dQw4w9WgXcQ")
        );
        assert_eq!(settings.chunk_threshold_bytes(), 25 * 1024 * 1024);
    }
}
