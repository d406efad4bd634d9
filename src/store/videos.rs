//! Video row operations.

use super::models::{DownloadStatus, NewVideo, Video};
use super::Store;
use crate::error::{DependentResource, KvissError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(Video {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        thumbnail_url: row.get(3)?,
        audio_path: row.get(4)?,
        download_status: status.parse().unwrap_or(DownloadStatus::Failed),
        created_at: Store::parse_ts(&created_at),
    })
}

const VIDEO_COLUMNS: &str =
    "id, external_id, title, thumbnail_url, audio_path, download_status, created_at";

impl Store {
    /// Insert a new video. Fails with Duplicate if the external id exists.
    #[instrument(skip(self, new), fields(external_id = %new.external_id))]
    pub fn insert_video(&self, new: &NewVideo) -> Result<Video> {
        let conn = self.lock()?;

        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM videos WHERE external_id = ?1",
                params![new.external_id],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_some() {
            return Err(KvissError::Duplicate(format!(
                "Video {} already exists",
                new.external_id
            )));
        }

        conn.execute(
            r#"
            INSERT INTO videos (external_id, title, thumbnail_url, audio_path, download_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                new.external_id,
                new.title,
                new.thumbnail_url,
                new.audio_path,
                new.download_status.as_str(),
                Store::now(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted video {} (id {})", new.external_id, id);

        Self::fetch_video(&conn, id)
    }

    fn fetch_video(conn: &Connection, id: i64) -> Result<Video> {
        let video = conn.query_row(
            &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
            params![id],
            video_from_row,
        )?;
        Ok(video)
    }

    /// Look up a video by its surrogate key.
    pub fn get_video(&self, id: i64) -> Result<Option<Video>> {
        let conn = self.lock()?;
        let video = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
                params![id],
                video_from_row,
            )
            .optional()?;
        Ok(video)
    }

    /// Look up a video by external id.
    pub fn get_video_by_external_id(&self, external_id: &str) -> Result<Option<Video>> {
        let conn = self.lock()?;
        let video = conn
            .query_row(
                &format!(
                    "SELECT {} FROM videos WHERE external_id = ?1",
                    VIDEO_COLUMNS
                ),
                params![external_id],
                video_from_row,
            )
            .optional()?;
        Ok(video)
    }

    /// List videos, newest first.
    pub fn list_videos(&self, skip: i64, limit: i64) -> Result<Vec<Video>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            VIDEO_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit, skip], video_from_row)?;
        let videos: Vec<Video> = rows.filter_map(|v| v.ok()).collect();
        Ok(videos)
    }

    pub fn count_videos(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Update the download status of a video.
    pub fn update_video_status(&self, external_id: &str, status: DownloadStatus) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE videos SET download_status = ?1 WHERE external_id = ?2",
            params![status.as_str(), external_id],
        )?;
        if updated == 0 {
            return Err(KvissError::NotFound(format!("Video {}", external_id)));
        }
        Ok(())
    }

    /// Rows that reference this video: chunks, transcriptions, and questions
    /// (questions reference by denormalized external id).
    pub fn dependents_of_video(&self, video: &Video) -> Result<Vec<DependentResource>> {
        let conn = self.lock()?;
        let mut deps = Vec::new();

        let mut stmt =
            conn.prepare("SELECT id FROM audio_chunks WHERE video_id = ?1 ORDER BY id")?;
        for id in stmt.query_map(params![video.id], |row| row.get::<_, i64>(0))? {
            deps.push(DependentResource::new("audio_chunk", id?));
        }

        let mut stmt =
            conn.prepare("SELECT id FROM transcriptions WHERE video_id = ?1 ORDER BY id")?;
        for id in stmt.query_map(params![video.id], |row| row.get::<_, i64>(0))? {
            deps.push(DependentResource::new("transcription", id?));
        }

        let mut stmt = conn.prepare("SELECT id FROM questions WHERE video_id = ?1 ORDER BY id")?;
        for id in stmt.query_map(params![video.external_id], |row| row.get::<_, i64>(0))? {
            deps.push(DependentResource::new("question", id?));
        }

        Ok(deps)
    }

    /// Delete a video row.
    ///
    /// Without `cascade`, fails with DependencyViolation when dependent rows
    /// exist. Returns the audio file paths that were referenced by the
    /// deleted rows; the caller removes them best-effort (the row delete is
    /// the source of truth and is never rolled back for file errors).
    #[instrument(skip(self))]
    pub fn delete_video(&self, external_id: &str, cascade: bool) -> Result<Vec<PathBuf>> {
        let video = self
            .get_video_by_external_id(external_id)?
            .ok_or_else(|| KvissError::NotFound(format!("Video {}", external_id)))?;

        let dependents = self.dependents_of_video(&video)?;
        if !cascade && !dependents.is_empty() {
            return Err(KvissError::DependencyViolation {
                message: format!(
                    "Video {} has {} dependent resource(s); delete with cascade to remove them",
                    external_id,
                    dependents.len()
                ),
                resources: dependents,
            });
        }

        let conn = self.lock()?;

        let mut paths: Vec<PathBuf> = Vec::new();
        if let Some(p) = &video.audio_path {
            paths.push(PathBuf::from(p));
        }
        let mut stmt = conn.prepare("SELECT file_path FROM audio_chunks WHERE video_id = ?1")?;
        for path in stmt.query_map(params![video.id], |row| row.get::<_, String>(0))? {
            paths.push(PathBuf::from(path?));
        }
        drop(stmt);

        let tx = conn.unchecked_transaction()?;
        // Chunk and transcription rows cascade via their foreign keys;
        // questions are keyed by external id and removed explicitly.
        tx.execute(
            "DELETE FROM questions WHERE video_id = ?1",
            params![video.external_id],
        )?;
        tx.execute("DELETE FROM videos WHERE id = ?1", params![video.id])?;
        tx.commit()?;

        info!(
            "Deleted video {} and {} referenced file path(s)",
            external_id,
            paths.len()
        );
        Ok(paths)
    }
}
