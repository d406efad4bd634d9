//! Error types for Kviss.

use serde::Serialize;
use thiserror::Error;

/// A dependent row that blocks a non-cascading delete.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DependentResource {
    /// Resource kind: "audio_chunk", "transcription", or "question".
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
}

impl DependentResource {
    pub fn new(kind: &str, id: i64) -> Self {
        Self {
            kind: kind.to_string(),
            id,
        }
    }
}

/// Library-level error type for Kviss operations.
#[derive(Error, Debug)]
pub enum KvissError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("{message}")]
    DependencyViolation {
        message: String,
        resources: Vec<DependentResource>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Remote operation failed: {0}")]
    RemoteFailure(String),

    #[error("Audio chunking failed: {0}")]
    ChunkingFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("LLM backend unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Provider temporarily unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

/// Result type alias for Kviss operations.
pub type Result<T> = std::result::Result<T, KvissError>;
