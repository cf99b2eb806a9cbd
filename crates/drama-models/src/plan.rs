//! Episode segmentation planning.
//!
//! Derives episode boundaries from the total source duration and the
//! requested episode length. Pure arithmetic; the worker drives one encode
//! per emitted segment.

use serde::{Deserialize, Serialize};

/// Minimum accepted episode length in seconds. Shorter requests are floored.
pub const MIN_SEGMENT_SEC: u32 = 30;

/// Trailing segments shorter than this are dropped entirely. Source duration
/// probing routinely overestimates by a few seconds; emitting a near-empty
/// final episode is worse than losing those seconds.
pub const MIN_TAIL_SEC: u32 = 15;

/// Default cap on emitted episodes.
pub const MAX_SEGMENTS_DEFAULT: u32 = 50;

/// One planned episode: a bounded time-slice of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based episode number, dense in emission order.
    pub episode_number: u32,
    /// Start offset into the source, in seconds.
    pub start_sec: u32,
    /// Episode duration in seconds.
    pub duration_sec: u32,
}

/// Plan episode boundaries.
///
/// Segment count is `ceil(total / seg)` capped at `max_segments`
/// (default 50). Segment `i` starts at `i * seg` and runs for
/// `min(seg, total - start)`. Emission stops at the cap, when the source is
/// exhausted, or when only a sub-[`MIN_TAIL_SEC`] tail remains.
pub fn plan_segments(
    total_duration_sec: u32,
    requested_segment_sec: u32,
    max_segments: Option<u32>,
) -> Vec<Segment> {
    let seg = requested_segment_sec.max(MIN_SEGMENT_SEC);
    let max = max_segments.unwrap_or(MAX_SEGMENTS_DEFAULT).max(1);

    let count = total_duration_sec.div_ceil(seg).max(1).min(max);

    let mut segments = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * seg;
        if start >= total_duration_sec {
            break;
        }

        let remaining = total_duration_sec - start;
        let duration = seg.min(remaining);
        if duration < MIN_TAIL_SEC {
            break;
        }

        segments.push(Segment {
            episode_number: i + 1,
            start_sec: start,
            duration_sec: duration,
        });
    }

    segments
}
