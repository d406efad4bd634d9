//! Durable persistence for videos, chunks, transcriptions, generations, and
//! questions.
//!
//! Backed by SQLite with WAL mode and enforced foreign keys. Embeddings are
//! stored as little-endian f32 BLOBs of a fixed configured width; the store
//! validates the width on insert but never interprets the vectors.

mod chunks;
mod generations;
mod models;
mod transcriptions;
mod videos;

pub use models::{
    AudioChunk, Difficulty, DownloadStatus, Generation, NewChunk, NewQuestion, NewVideo, Question,
    QuestionType, QuestionUpdate, Transcription, Video,
};

use crate::error::{KvissError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

/// SQLite-backed store. The connection is serialized behind a mutex; all
/// writes run in short transactions.
pub struct Store {
    conn: Mutex<Connection>,
    embedding_dim: usize,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    thumbnail_url TEXT,
    audio_path TEXT,
    download_status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audio_chunks (
    id INTEGER PRIMARY KEY,
    video_id INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    start_ms INTEGER NOT NULL,
    end_ms INTEGER NOT NULL,
    UNIQUE (video_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_audio_chunks_video_id ON audio_chunks(video_id);

CREATE TABLE IF NOT EXISTS transcriptions (
    id INTEGER PRIMARY KEY,
    video_id INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    embedding BLOB,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transcriptions_video_id ON transcriptions(video_id);

CREATE TABLE IF NOT EXISTS generations (
    id INTEGER PRIMARY KEY,
    video_ids TEXT NOT NULL,
    question_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY,
    generation_id INTEGER NOT NULL REFERENCES generations(id) ON DELETE CASCADE,
    video_id TEXT NOT NULL,
    question_text TEXT NOT NULL,
    answer TEXT,
    context TEXT,
    difficulty TEXT,
    question_type TEXT,
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_generation_id ON questions(generation_id);
CREATE INDEX IF NOT EXISTS idx_questions_video_id ON questions(video_id);
"#;

impl Store {
    /// Open (creating if necessary) the database at `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, embedding_dim: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        info!("Opened store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    /// In-memory store (useful for testing).
    pub fn in_memory(embedding_dim: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Configured embedding vector width.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KvissError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// All audio file paths referenced by any row (originals and chunks).
    pub fn referenced_audio_paths(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut paths = Vec::new();

        let mut stmt =
            conn.prepare("SELECT audio_path FROM videos WHERE audio_path IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            paths.push(row?);
        }

        let mut stmt = conn.prepare("SELECT file_path FROM audio_chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            paths.push(row?);
        }

        Ok(paths)
    }

    /// Serialize an embedding to little-endian bytes.
    pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize an embedding from little-endian bytes.
    pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    pub(crate) fn now() -> String {
        Utc::now().to_rfc3339()
    }

    pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}
