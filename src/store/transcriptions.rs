//! Transcription row operations.

use super::models::Transcription;
use super::Store;
use crate::error::{KvissError, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument};

fn transcription_from_row(row: &Row<'_>) -> rusqlite::Result<Transcription> {
    let embedding_bytes: Option<Vec<u8>> = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(Transcription {
        id: row.get(0)?,
        video_id: row.get(1)?,
        video_external_id: row.get(2)?,
        text: row.get(3)?,
        embedding: embedding_bytes.map(|b| Store::bytes_to_embedding(&b)),
        status: row.get(5)?,
        created_at: Store::parse_ts(&created_at),
    })
}

const SELECT: &str = r#"
SELECT t.id, t.video_id, v.external_id, t.text, t.embedding, t.status, t.created_at
FROM transcriptions t
JOIN videos v ON v.id = t.video_id
"#;

impl Store {
    /// Insert a transcription for a video.
    ///
    /// Fails with NotFound when the video is absent and with Validation when
    /// the vector width differs from the configured dimension. Re-runs are
    /// allowed; there is no uniqueness constraint per video.
    #[instrument(skip(self, text, embedding), fields(video = %video_external_id))]
    pub fn insert_transcription(
        &self,
        video_external_id: &str,
        text: &str,
        embedding: Option<&[f32]>,
        status: &str,
    ) -> Result<Transcription> {
        if let Some(vector) = embedding {
            if vector.len() != self.embedding_dim() {
                return Err(KvissError::Validation(format!(
                    "Embedding has {} dimensions, store expects {}",
                    vector.len(),
                    self.embedding_dim()
                )));
            }
        }

        let video = self
            .get_video_by_external_id(video_external_id)?
            .ok_or_else(|| KvissError::NotFound(format!("Video {}", video_external_id)))?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO transcriptions (video_id, text, embedding, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                video.id,
                text,
                embedding.map(Store::embedding_to_bytes),
                status,
                Store::now(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted transcription {} for video {}", id, video.id);

        let transcription = conn.query_row(
            &format!("{} WHERE t.id = ?1", SELECT),
            params![id],
            transcription_from_row,
        )?;
        Ok(transcription)
    }

    pub fn get_transcription(&self, id: i64) -> Result<Option<Transcription>> {
        let conn = self.lock()?;
        let transcription = conn
            .query_row(
                &format!("{} WHERE t.id = ?1", SELECT),
                params![id],
                transcription_from_row,
            )
            .optional()?;
        Ok(transcription)
    }

    /// List transcriptions, newest first, optionally filtered by video.
    pub fn list_transcriptions(
        &self,
        skip: i64,
        limit: i64,
        video_external_id: Option<&str>,
    ) -> Result<Vec<Transcription>> {
        let conn = self.lock()?;

        let rows = match video_external_id {
            Some(ext) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE v.external_id = ?1 ORDER BY t.id DESC LIMIT ?2 OFFSET ?3",
                    SELECT
                ))?;
                let mapped = stmt.query_map(params![ext, limit, skip], transcription_from_row)?;
                mapped.filter_map(|t| t.ok()).collect()
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{} ORDER BY t.id DESC LIMIT ?1 OFFSET ?2",
                    SELECT
                ))?;
                let mapped = stmt.query_map(params![limit, skip], transcription_from_row)?;
                mapped.filter_map(|t| t.ok()).collect()
            }
        };

        Ok(rows)
    }

    pub fn count_transcriptions(&self, video_external_id: Option<&str>) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = match video_external_id {
            Some(ext) => conn.query_row(
                r#"
                SELECT COUNT(*) FROM transcriptions t
                JOIN videos v ON v.id = t.video_id
                WHERE v.external_id = ?1
                "#,
                params![ext],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM transcriptions", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// All transcriptions of one video, newest first.
    pub fn transcriptions_for_video(&self, video_external_id: &str) -> Result<Vec<Transcription>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE v.external_id = ?1 ORDER BY t.id DESC",
            SELECT
        ))?;
        let rows = stmt.query_map(params![video_external_id], transcription_from_row)?;
        let transcriptions: Vec<Transcription> = rows.filter_map(|t| t.ok()).collect();
        Ok(transcriptions)
    }

    /// The most recent transcription of one video, if any.
    pub fn latest_transcription_for_video(
        &self,
        video_external_id: &str,
    ) -> Result<Option<Transcription>> {
        let conn = self.lock()?;
        let transcription = conn
            .query_row(
                &format!(
                    "{} WHERE v.external_id = ?1 ORDER BY t.id DESC LIMIT 1",
                    SELECT
                ),
                params![video_external_id],
                transcription_from_row,
            )
            .optional()?;
        Ok(transcription)
    }

    pub fn delete_transcription(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM transcriptions WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(KvissError::NotFound(format!("Transcription {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DownloadStatus, NewVideo};

    fn seed_video(store: &Store, external_id: &str) {
        store
            .insert_video(&NewVideo {
                external_id: external_id.to_string(),
                title: "t".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Completed,
            })
            .unwrap();
    }

    #[test]
    fn test_insert_requires_video() {
        let store = Store::in_memory(4).unwrap();
        let err = store
            .insert_transcription("missing00000", "text", None, "completed")
            .unwrap_err();
        assert!(matches!(err, KvissError::NotFound(_)));
    }

    #[test]
    fn test_vector_width_validated() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "aaaaaaaaaaa");

        let err = store
            .insert_transcription("aaaaaaaaaaa", "text", Some(&[1.0, 0.0]), "completed")
            .unwrap_err();
        assert!(matches!(err, KvissError::Validation(_)));

        let ok = store
            .insert_transcription(
                "aaaaaaaaaaa",
                "text",
                Some(&[1.0, 0.0, 0.0, 0.0]),
                "completed",
            )
            .unwrap();
        assert_eq!(ok.embedding.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_reruns_allowed_and_latest_wins() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "aaaaaaaaaaa");

        store
            .insert_transcription("aaaaaaaaaaa", "first", None, "completed_no_embedding")
            .unwrap();
        let second = store
            .insert_transcription("aaaaaaaaaaa", "second", None, "completed_no_embedding")
            .unwrap();

        let all = store.transcriptions_for_video("aaaaaaaaaaa").unwrap();
        assert_eq!(all.len(), 2);

        let latest = store
            .latest_transcription_for_video("aaaaaaaaaaa")
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.text, "second");
        assert_eq!(latest.video_external_id, "aaaaaaaaaaa");
    }

    #[test]
    fn test_filtered_listing() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "aaaaaaaaaaa");
        seed_video(&store, "bbbbbbbbbbb");

        store
            .insert_transcription("aaaaaaaaaaa", "a", None, "completed_no_embedding")
            .unwrap();
        store
            .insert_transcription("bbbbbbbbbbb", "b", None, "completed_no_embedding")
            .unwrap();

        let filtered = store
            .list_transcriptions(0, 10, Some("aaaaaaaaaaa"))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].text, "a");
        assert_eq!(store.count_transcriptions(Some("aaaaaaaaaaa")).unwrap(), 1);
        assert_eq!(store.count_transcriptions(None).unwrap(), 2);
    }

    #[test]
    fn test_delete() {
        let store = Store::in_memory(4).unwrap();
        seed_video(&store, "aaaaaaaaaaa");
        let t = store
            .insert_transcription("aaaaaaaaaaa", "text", None, "completed_no_embedding")
            .unwrap();

        store.delete_transcription(t.id).unwrap();
        assert!(store.get_transcription(t.id).unwrap().is_none());
        assert!(matches!(
            store.delete_transcription(t.id).unwrap_err(),
            KvissError::NotFound(_)
        ));
    }
}
