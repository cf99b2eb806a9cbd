//! Parsing for FFmpeg `-progress` output.
//!
//! With `-progress pipe:1 -nostats`, FFmpeg writes blocks of `key=value`
//! lines terminated by a `progress=continue` (or `progress=end`) line.
//! Despite the name, `out_time_ms` carries microseconds.

/// A snapshot of encode progress, built up from one progress block.
#[derive(Debug, Clone, Default)]
pub struct EncodeProgress {
    /// Output timestamp in microseconds (`out_time_ms` field).
    pub out_time_us: Option<u64>,
    /// Frames encoded so far.
    pub frame: Option<u64>,
    /// Encoding speed relative to realtime (e.g. 2.5 for "2.5x").
    pub speed: Option<f64>,
    /// True once FFmpeg reports `progress=end`.
    pub ended: bool,
}

impl EncodeProgress {
    /// Output position in seconds.
    pub fn out_time_sec(&self) -> Option<f64> {
        self.out_time_us.map(|us| us as f64 / 1_000_000.0)
    }

    /// Completion percentage against a known duration, clamped to [0, 99].
    ///
    /// 100 is reserved for a clean process exit, which only the caller can
    /// observe.
    pub fn percent(&self, duration_sec: f64) -> Option<u8> {
        if duration_sec <= 0.0 {
            return None;
        }
        let out = self.out_time_sec()?;
        let pct = (out / duration_sec * 100.0).floor();
        Some(pct.clamp(0.0, 99.0) as u8)
    }
}

/// Feed one line of `-progress` output into `current`.
///
/// Returns a snapshot when the line completes a block (the `progress=` key),
/// otherwise `None`. Unknown keys are ignored.
pub fn parse_progress_line(line: &str, current: &mut EncodeProgress) -> Option<EncodeProgress> {
    let (key, value) = line.split_once('=')?;
    match key.trim() {
        "out_time_ms" | "out_time_us" => {
            current.out_time_us = value.trim().parse().ok();
            None
        }
        "frame" => {
            current.frame = value.trim().parse().ok();
            None
        }
        "speed" => {
            current.speed = value.trim().trim_end_matches('x').parse().ok();
            None
        }
        "progress" => {
            current.ended = value.trim() == "end";
            Some(current.clone())
        }
        _ => None,
    }
}

/// Suppresses progress reports that change by less than two points.
///
/// The queue API treats progress as best-effort; the gate keeps chatter down
/// without losing the shape of the curve.
#[derive(Debug, Default)]
pub struct ProgressGate {
    last_reported: Option<u8>,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a percentage; returns `Some` when it should be reported.
    pub fn observe(&mut self, pct: u8) -> Option<u8> {
        let pct = pct.min(99);
        match self.last_reported {
            Some(last) if pct < last.saturating_add(2) => None,
            _ => {
                self.last_reported = Some(pct);
                Some(pct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        let mut current = EncodeProgress::default();
        assert!(parse_progress_line("frame=120", &mut current).is_none());
        assert!(parse_progress_line("out_time_ms=5000000", &mut current).is_none());
        assert!(parse_progress_line("speed=2.5x", &mut current).is_none());

        let snap = parse_progress_line("progress=continue", &mut current).unwrap();
        assert_eq!(snap.frame, Some(120));
        assert_eq!(snap.out_time_sec(), Some(5.0));
        assert_eq!(snap.speed, Some(2.5));
        assert!(!snap.ended);

        let snap = parse_progress_line("progress=end", &mut current).unwrap();
        assert!(snap.ended);
    }

    #[test]
    fn test_ignores_noise() {
        let mut current = EncodeProgress::default();
        assert!(parse_progress_line("", &mut current).is_none());
        assert!(parse_progress_line("bitrate=1200.3kbits/s", &mut current).is_none());
        assert!(parse_progress_line("out_time_ms=N/A", &mut current).is_none());
        assert!(current.out_time_us.is_none());
    }

    #[test]
    fn test_percent_clamped_below_hundred() {
        let progress = EncodeProgress {
            out_time_us: Some(120_000_000),
            ..Default::default()
        };
        // Past the nominal duration but the process has not exited yet.
        assert_eq!(progress.percent(100.0), Some(99));
        assert_eq!(progress.percent(240.0), Some(50));
        assert_eq!(progress.percent(0.0), None);
    }

    #[test]
    fn test_gate_reports_on_two_point_delta() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.observe(0), Some(0));
        assert_eq!(gate.observe(1), None);
        assert_eq!(gate.observe(2), Some(2));
        assert_eq!(gate.observe(3), None);
        assert_eq!(gate.observe(7), Some(7));
    }

    #[test]
    fn test_gate_never_exceeds_ninety_nine() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.observe(100), Some(99));
        assert_eq!(gate.observe(100), None);
    }
}
