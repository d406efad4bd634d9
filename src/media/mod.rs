//! Media acquisition and filesystem utilities.
//!
//! Wraps the external downloader and FFmpeg tooling behind typed operations.
//! Audio artifacts live under `<storage>/audio/`; paths are derived from the
//! video's external id and are write-once.

mod fetcher;
pub mod probe;
pub mod process;
mod sweep;

pub use fetcher::{extract_external_id, FetchOutcome, MediaFetcher};
pub use sweep::{sweep_storage, SweepReport};

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Wall-clock limit for a full audio download.
pub(crate) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Wall-clock limit for metadata probes and per-chunk FFmpeg work.
pub(crate) const TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Remove files, logging failures instead of propagating them. The row
/// delete that preceded this is the source of truth; leftover files are
/// picked up by the orphan sweep.
pub fn remove_files_best_effort(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {:?}: {}", path, e),
        }
    }
    removed
}
