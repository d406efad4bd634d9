//! Silence detection via FFmpeg's silencedetect filter.

use crate::error::{KvissError, Result};
use crate::media::process::run_tool;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

fn start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"silence_start:\s*(-?[0-9.]+)").expect("Invalid regex"))
}

fn end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"silence_end:\s*(-?[0-9.]+)").expect("Invalid regex"))
}

/// Run silencedetect and return the midpoints of detected silences, in
/// milliseconds, ordered by position.
pub async fn detect_silence_midpoints(
    path: &Path,
    noise_floor_db: f64,
    min_silence_s: f64,
    timeout: Duration,
) -> Result<Vec<u64>> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-hide_banner")
        .arg("-nostats")
        .arg("-i")
        .arg(path)
        .arg("-af")
        .arg(format!(
            "silencedetect=noise={}dB:d={}",
            noise_floor_db, min_silence_s
        ))
        .arg("-f")
        .arg("null")
        .arg("-");

    let output = run_tool(cmd, "ffmpeg", timeout).await?;

    if !output.status.success() {
        return Err(KvissError::ChunkingFailed(format!(
            "silencedetect failed for {:?}",
            path
        )));
    }

    // silencedetect reports on stderr.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let midpoints = parse_silence_midpoints(&stderr);
    debug!("Detected {} silence(s) in {:?}", midpoints.len(), path);
    Ok(midpoints)
}

/// Parse silencedetect output into silence midpoints (ms).
pub(crate) fn parse_silence_midpoints(stderr: &str) -> Vec<u64> {
    let mut midpoints = Vec::new();
    let mut pending_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = start_regex().captures(line) {
            pending_start = caps[1].parse::<f64>().ok();
        } else if let Some(caps) = end_regex().captures(line) {
            if let (Some(start), Ok(end)) = (pending_start.take(), caps[1].parse::<f64>()) {
                if end > start && start >= 0.0 {
                    midpoints.push(((start + end) / 2.0 * 1000.0).round() as u64);
                }
            }
        }
    }

    midpoints.sort_unstable();
    midpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[silencedetect @ 0x55d1c8a] silence_start: 12.48\n\
[silencedetect @ 0x55d1c8a] silence_end: 13.02 | silence_duration: 0.54\n\
size=N/A time=00:01:00.00 bitrate=N/A speed= 512x\n\
[silencedetect @ 0x55d1c8a] silence_start: 45.1\n\
[silencedetect @ 0x55d1c8a] silence_end: 45.5 | silence_duration: 0.4\n";

    #[test]
    fn test_parse_pairs_into_midpoints() {
        let midpoints = parse_silence_midpoints(SAMPLE);
        assert_eq!(midpoints, vec![12_750, 45_300]);
    }

    #[test]
    fn test_parse_ignores_unpaired_start() {
        let midpoints = parse_silence_midpoints("silence_start: 3.0\n");
        assert!(midpoints.is_empty());
    }

    #[test]
    fn test_parse_ignores_end_without_start() {
        let midpoints =
            parse_silence_midpoints("silence_end: 3.0 | silence_duration: 1.0\n");
        assert!(midpoints.is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_silence_midpoints("").is_empty());
    }
}
