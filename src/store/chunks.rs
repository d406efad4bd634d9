//! Audio chunk row operations.

use super::models::{AudioChunk, NewChunk};
use super::Store;
use crate::error::Result;
use rusqlite::{params, Row};
use tracing::{debug, instrument};

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<AudioChunk> {
    Ok(AudioChunk {
        id: row.get(0)?,
        video_id: row.get(1)?,
        chunk_index: row.get(2)?,
        file_path: row.get(3)?,
        size_bytes: row.get(4)?,
        start_ms: row.get(5)?,
        end_ms: row.get(6)?,
    })
}

const CHUNK_COLUMNS: &str = "id, video_id, chunk_index, file_path, size_bytes, start_ms, end_ms";

impl Store {
    /// Insert a full chunk set for one video, all-or-nothing.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub fn insert_chunks(&self, video_id: i64, chunks: &[NewChunk]) -> Result<Vec<AudioChunk>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO audio_chunks (video_id, chunk_index, file_path, size_bytes, start_ms, end_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    video_id,
                    chunk.chunk_index,
                    chunk.file_path,
                    chunk.size_bytes,
                    chunk.start_ms,
                    chunk.end_ms,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Persisted {} chunks for video {}", chunks.len(), video_id);
        drop(conn);

        self.chunks_for_video(video_id)
    }

    /// Chunks for one video, in index order.
    pub fn chunks_for_video(&self, video_id: i64) -> Result<Vec<AudioChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audio_chunks WHERE video_id = ?1 ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![video_id], chunk_from_row)?;
        let chunks: Vec<AudioChunk> = rows.filter_map(|c| c.ok()).collect();
        Ok(chunks)
    }

    /// Whether any chunks exist for this video.
    pub fn has_chunks(&self, video_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audio_chunks WHERE video_id = ?1",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvissError;
    use crate::store::{DownloadStatus, NewVideo};

    fn seed_video(store: &Store) -> i64 {
        store
            .insert_video(&NewVideo {
                external_id: "aaaaaaaaaaa".to_string(),
                title: "t".to_string(),
                thumbnail_url: None,
                audio_path: None,
                download_status: DownloadStatus::Completed,
            })
            .unwrap()
            .id
    }

    fn chunk(index: i64, start_ms: i64, end_ms: i64) -> NewChunk {
        NewChunk {
            chunk_index: index,
            file_path: format!("/tmp/c_{:03}.mp3", index),
            size_bytes: 100,
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn test_insert_and_order() {
        let store = Store::in_memory(4).unwrap();
        let video_id = seed_video(&store);

        let chunks = store
            .insert_chunks(
                video_id,
                &[chunk(0, 0, 1000), chunk(1, 1000, 2000), chunk(2, 2000, 2500)],
            )
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(store.has_chunks(video_id).unwrap());

        let indices: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        // Contiguous partition of the original audio.
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
    }

    #[test]
    fn test_duplicate_index_rolls_back_whole_set() {
        let store = Store::in_memory(4).unwrap();
        let video_id = seed_video(&store);

        let err = store
            .insert_chunks(video_id, &[chunk(0, 0, 1000), chunk(0, 1000, 2000)])
            .unwrap_err();
        assert!(matches!(err, KvissError::Database(_)));

        // Nothing persisted from the failed batch.
        assert!(!store.has_chunks(video_id).unwrap());
    }

    #[test]
    fn test_foreign_key_enforced() {
        let store = Store::in_memory(4).unwrap();
        let err = store.insert_chunks(999, &[chunk(0, 0, 1000)]).unwrap_err();
        assert!(matches!(err, KvissError::Database(_)));
    }
}
