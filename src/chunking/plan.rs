//! Pure split planning over silence boundaries.

/// One planned slice of the original audio, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSegment {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl PlannedSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Target duration so each slice lands under the size threshold, with a 5%
/// safety margin for container overhead.
pub fn target_chunk_ms(duration_ms: u64, file_size_bytes: u64, threshold_bytes: u64) -> u64 {
    if file_size_bytes == 0 {
        return duration_ms.max(1);
    }
    let target = duration_ms as f64 * (threshold_bytes as f64 / file_size_bytes as f64) * 0.95;
    (target as u64).max(1)
}

/// Walk silence midpoints greedily: from each segment start, cut at the
/// latest midpoint within the target window, or exactly at the window edge
/// when no silence falls inside it (a forced cut).
///
/// The result is a contiguous, non-overlapping, ordered partition covering
/// [0, duration_ms].
pub fn plan_segments(
    duration_ms: u64,
    target_ms: u64,
    silence_midpoints_ms: &[u64],
) -> Vec<PlannedSegment> {
    let mut midpoints = silence_midpoints_ms.to_vec();
    midpoints.sort_unstable();

    let target_ms = target_ms.max(1);
    let mut segments = Vec::new();
    let mut start = 0u64;

    while start < duration_ms {
        let window_end = start.saturating_add(target_ms);

        if window_end >= duration_ms {
            segments.push(PlannedSegment {
                start_ms: start,
                end_ms: duration_ms,
            });
            break;
        }

        let cut = midpoints
            .iter()
            .copied()
            .filter(|&m| m > start && m <= window_end && m < duration_ms)
            .next_back()
            .unwrap_or(window_end);

        segments.push(PlannedSegment {
            start_ms: start,
            end_ms: cut,
        });
        start = cut;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(segments: &[PlannedSegment], duration_ms: u64) {
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments.last().unwrap().end_ms, duration_ms);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
            assert!(pair[0].end_ms > pair[0].start_ms);
        }
    }

    #[test]
    fn test_target_chunk_ms() {
        // 120 MB file over an hour with a 25 MB threshold: each slice covers
        // just under 25/120 of the duration.
        let target = target_chunk_ms(3_600_000, 120 * 1024 * 1024, 25 * 1024 * 1024);
        assert!(target < 3_600_000 * 25 / 120);
        assert!(target > 3_600_000 * 25 / 120 * 9 / 10);

        // Degenerate size never yields a zero target.
        assert_eq!(target_chunk_ms(1000, 0, 25), 1000);
    }

    #[test]
    fn test_prefers_latest_silence_in_window() {
        let segments = plan_segments(10_000, 4_000, &[1_000, 3_500, 7_200]);
        assert_partition(&segments, 10_000);
        // First window [0, 4000] contains midpoints 1000 and 3500; the
        // latest wins.
        assert_eq!(segments[0].end_ms, 3_500);
        // Second window [3500, 7500] contains 7200.
        assert_eq!(segments[1].end_ms, 7_200);
    }

    #[test]
    fn test_forced_cut_without_silence() {
        let segments = plan_segments(10_000, 3_000, &[]);
        assert_partition(&segments, 10_000);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].end_ms, 3_000);
        assert_eq!(segments[1].end_ms, 6_000);
        assert_eq!(segments[2].end_ms, 9_000);
        assert_eq!(segments[3].end_ms, 10_000);
    }

    #[test]
    fn test_silence_outside_window_forces_cut() {
        // Only midpoint is past the first window; the first cut is forced.
        let segments = plan_segments(10_000, 3_000, &[9_000]);
        assert_partition(&segments, 10_000);
        assert_eq!(segments[0].end_ms, 3_000);
    }

    #[test]
    fn test_short_audio_single_segment() {
        let segments = plan_segments(2_000, 5_000, &[500, 1_000]);
        assert_eq!(
            segments,
            vec![PlannedSegment {
                start_ms: 0,
                end_ms: 2_000
            }]
        );
    }

    #[test]
    fn test_midpoint_at_duration_ignored() {
        // A midpoint at (or past) the end must not create an empty segment.
        let segments = plan_segments(6_000, 5_000, &[6_000, 7_000]);
        assert_partition(&segments, 6_000);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_unsorted_midpoints() {
        let segments = plan_segments(10_000, 4_000, &[3_500, 1_000, 7_200]);
        assert_partition(&segments, 10_000);
        assert_eq!(segments[0].end_ms, 3_500);
    }
}
