//! Persisted entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Download lifecycle of a video's audio artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DownloadStatus::Pending),
            "downloading" => Ok(DownloadStatus::Downloading),
            "completed" => Ok(DownloadStatus::Completed),
            "failed" => Ok(DownloadStatus::Failed),
            _ => Err(format!("Unknown download status: {}", s)),
        }
    }
}

/// A source video and its audio artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: i64,
    /// The 11-character identifier of the source video.
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Absolute path of the downloaded audio, once materialized.
    pub audio_path: Option<String>,
    pub download_status: DownloadStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a new video.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub audio_path: Option<String>,
    pub download_status: DownloadStatus,
}

/// A contiguous slice of an original audio file.
#[derive(Debug, Clone, Serialize)]
pub struct AudioChunk {
    pub id: i64,
    pub video_id: i64,
    pub chunk_index: i64,
    pub file_path: String,
    pub size_bytes: i64,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Fields for inserting a new chunk.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub file_path: String,
    pub size_bytes: i64,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A transcription of one video's audio.
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub id: i64,
    pub video_id: i64,
    /// Denormalized external id of the parent video.
    pub video_external_id: String,
    pub text: String,
    /// Unit-norm embedding, absent when embedding failed.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One batch question-generation event.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub id: i64,
    /// External ids of the source videos, in request order.
    pub video_ids: Vec<String>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

/// Question category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Factual,
    Conceptual,
    Analytical,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Factual => "factual",
            QuestionType::Conceptual => "conceptual",
            QuestionType::Analytical => "analytical",
        }
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "factual" => Ok(QuestionType::Factual),
            "conceptual" => Ok(QuestionType::Conceptual),
            "analytical" => Ok(QuestionType::Analytical),
            _ => Err(format!("Unknown question type: {}", s)),
        }
    }
}

/// An educational question within a generation.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub generation_id: i64,
    /// External id of the video this question was drawn from.
    pub video_id: String,
    pub question_text: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    /// 0-based display order within the generation.
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub video_id: String,
    pub question_text: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
}

/// Partial update of a question; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub question_text: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub difficulty: Option<String>,
    pub question_type: Option<String>,
    pub order_index: Option<i64>,
}

impl QuestionUpdate {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.answer.is_none()
            && self.context.is_none()
            && self.difficulty.is_none()
            && self.question_type.is_none()
            && self.order_index.is_none()
    }
}
