//! Orphan audio file sweep.
//!
//! Files can outlive their rows when a best-effort delete fails or a
//! download is interrupted. The sweep reports (and optionally removes) files
//! under the storage root that no row references.

use crate::error::Result;
use crate::store::Store;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of one sweep pass.
#[derive(Debug)]
pub struct SweepReport {
    /// Files examined under the audio directories.
    pub scanned: usize,
    /// Files no row references.
    pub orphans: Vec<PathBuf>,
    /// Files actually removed (0 unless deletion was requested).
    pub removed: usize,
}

/// Scan `<audio_dir>` and `<audio_dir>/chunks/*/` for files not referenced
/// by any Video or AudioChunk row.
pub fn sweep_storage(store: &Store, audio_dir: &Path, delete: bool) -> Result<SweepReport> {
    let referenced: HashSet<PathBuf> = store
        .referenced_audio_paths()?
        .into_iter()
        .map(PathBuf::from)
        .collect();

    let mut scanned = 0;
    let mut orphans = Vec::new();

    collect_orphans(audio_dir, &referenced, &mut scanned, &mut orphans)?;

    let chunks_root = audio_dir.join("chunks");
    if chunks_root.is_dir() {
        for entry in std::fs::read_dir(&chunks_root)?.flatten() {
            if entry.path().is_dir() {
                collect_orphans(&entry.path(), &referenced, &mut scanned, &mut orphans)?;
            }
        }
    }

    let mut removed = 0;
    if delete {
        for orphan in &orphans {
            match std::fs::remove_file(orphan) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove orphan {:?}: {}", orphan, e),
            }
        }
    }

    info!(
        "Sweep scanned {} file(s), found {} orphan(s), removed {}",
        scanned,
        orphans.len(),
        removed
    );

    Ok(SweepReport {
        scanned,
        orphans,
        removed,
    })
}

fn collect_orphans(
    dir: &Path,
    referenced: &HashSet<PathBuf>,
    scanned: &mut usize,
    orphans: &mut Vec<PathBuf>,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        *scanned += 1;
        if !referenced.contains(&path) {
            orphans.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DownloadStatus, NewVideo};

    #[test]
    fn test_sweep_reports_and_removes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("audio");
        std::fs::create_dir_all(audio_dir.join("chunks/aaaaaaaaaaa")).unwrap();

        let referenced = audio_dir.join("aaaaaaaaaaa.mp3");
        let orphan = audio_dir.join("zzzzzzzzzzz.mp3");
        let chunk_orphan = audio_dir.join("chunks/aaaaaaaaaaa/stale_chunk_000.mp3");
        std::fs::write(&referenced, b"x").unwrap();
        std::fs::write(&orphan, b"x").unwrap();
        std::fs::write(&chunk_orphan, b"x").unwrap();

        let store = Store::in_memory(4).unwrap();
        store
            .insert_video(&NewVideo {
                external_id: "aaaaaaaaaaa".to_string(),
                title: "t".to_string(),
                thumbnail_url: None,
                audio_path: Some(referenced.to_string_lossy().to_string()),
                download_status: DownloadStatus::Completed,
            })
            .unwrap();

        // Report-only pass leaves files alone.
        let report = sweep_storage(&store, &audio_dir, false).unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.orphans.len(), 2);
        assert_eq!(report.removed, 0);
        assert!(orphan.exists());

        // Deleting pass removes only the orphans.
        let report = sweep_storage(&store, &audio_dir, true).unwrap();
        assert_eq!(report.removed, 2);
        assert!(referenced.exists());
        assert!(!orphan.exists());
        assert!(!chunk_orphan.exists());
    }
}
