//! Segment planning.
//!
//! Given total duration and size, every segment but the last spans the
//! longest duration whose projected size (at the average bitrate) stays within
//! the target. Consecutive segments share exactly `overlap`: segment `i+1`
//! starts at `end_i - overlap`. All arithmetic is in whole milliseconds so
//! that relation holds exactly.

use std::time::Duration;

use crate::error::SplitError;

/// Planned cut, before the transcoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSegment {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
}

impl PlannedSegment {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Longest segment duration whose projected size is at most `target_bytes`.
pub fn max_segment_duration(total: Duration, size_bytes: u64, target_bytes: u64) -> Duration {
    let total_ms = total.as_millis();
    let ms = total_ms * target_bytes as u128 / size_bytes.max(1) as u128;
    Duration::from_millis(ms.min(u64::MAX as u128) as u64)
}

/// Plan segments for a source of `total` duration and `size_bytes` bytes.
pub fn plan_segments(
    total: Duration,
    size_bytes: u64,
    target_bytes: u64,
    overlap: Duration,
) -> Result<Vec<PlannedSegment>, SplitError> {
    let total = Duration::from_millis(total.as_millis() as u64);
    if total.is_zero() {
        return Err(SplitError::InvalidPlan("source has zero duration".into()));
    }
    if size_bytes == 0 || target_bytes == 0 {
        return Err(SplitError::InvalidPlan("size and target must be non-zero".into()));
    }
    if size_bytes <= target_bytes {
        return Ok(vec![PlannedSegment {
            index: 0,
            start: Duration::ZERO,
            end: total,
        }]);
    }

    let overlap = Duration::from_millis(overlap.as_millis() as u64);
    let max_dur = max_segment_duration(total, size_bytes, target_bytes);
    if max_dur <= overlap {
        return Err(SplitError::InvalidPlan(format!(
            "segment duration {:?} does not exceed overlap {:?}",
            max_dur, overlap
        )));
    }
    let slice = max_dur - overlap;

    let mut segments = Vec::new();
    let mut start = Duration::ZERO;
    loop {
        let index = segments.len();
        if start + max_dur >= total {
            segments.push(PlannedSegment {
                index,
                start,
                end: total,
            });
            break;
        }
        segments.push(PlannedSegment {
            index,
            start,
            end: start + max_dur,
        });
        start += slice;
    }
    Ok(segments)
}
