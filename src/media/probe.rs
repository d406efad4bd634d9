//! FFprobe helpers.

use super::process::run_tool;
use super::TOOL_TIMEOUT;
use crate::error::{KvissError, Result};
use std::path::Path;
use tokio::process::Command;

/// Query the duration of an audio file via ffprobe's JSON output.
pub async fn duration_seconds(path: &Path) -> Result<f64> {
    let mut cmd = Command::new("ffprobe");
    cmd.arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path);

    let output = run_tool(cmd, "ffprobe", TOOL_TIMEOUT).await?;

    if !output.status.success() {
        return Err(KvissError::ChunkingFailed(format!(
            "ffprobe failed for {:?}",
            path
        )));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| KvissError::ChunkingFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| KvissError::ChunkingFailed("Could not determine audio duration".into()))
}

/// Size of a file in bytes.
pub async fn file_size_bytes(path: &Path) -> Result<u64> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(meta.len())
}
