//! Face-aware crop analysis for vertical reframing.
//!
//! The engine samples frames, detects faces, places a crop window per
//! sample, smooths and interpolates the trajectory, then collapses it to a
//! single static crop filter. Every failure mode degrades to the fixed
//! center-crop filter; crop analysis is never fatal to a job.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner, Tools};
use crate::detect::FaceDetector;
use crate::error::MediaResult;
use crate::probe::probe_video;
use drama_models::{CropWindow, FaceRegion};

/// Letterbox-free fallback: scale up to cover, crop the overflow.
pub const CENTER_CROP_FILTER: &str =
    "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920";

/// Tuning for the crop engine.
#[derive(Debug, Clone)]
pub struct CropConfig {
    pub target_width: u32,
    pub target_height: u32,
    /// Analyze every Nth frame.
    pub sample_stride: u32,
    /// Exponential smoothing factor; weight kept by the previous position.
    pub smoothing: f64,
    /// Face center sits this fraction down from the crop top.
    pub headroom: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            target_width: 1080,
            target_height: 1920,
            sample_stride: 5,
            smoothing: 0.85,
            headroom: 0.35,
        }
    }
}

impl CropConfig {
    pub fn target_aspect(&self) -> f64 {
        self.target_width as f64 / self.target_height as f64
    }
}

/// How the final crop was derived, by fraction of sampled frames with faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStrategy {
    FaceTracking,
    MixedFaceCenter,
    CenterCrop,
}

impl CropStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropStrategy::FaceTracking => "face_tracking",
            CropStrategy::MixedFaceCenter => "mixed_face_center",
            CropStrategy::CenterCrop => "center_crop",
        }
    }

    fn from_face_ratio(ratio: f64) -> Self {
        if ratio > 0.7 {
            CropStrategy::FaceTracking
        } else if ratio > 0.3 {
            CropStrategy::MixedFaceCenter
        } else {
            CropStrategy::CenterCrop
        }
    }
}

/// Result of crop analysis: a complete `-vf` filter chain plus diagnostics.
#[derive(Debug, Clone)]
pub struct CropAnalysis {
    pub filter: String,
    pub strategy: CropStrategy,
    /// Fraction of sampled frames with at least one face.
    pub face_ratio: f64,
}

impl CropAnalysis {
    fn center_fallback() -> Self {
        Self {
            filter: CENTER_CROP_FILTER.to_string(),
            strategy: CropStrategy::CenterCrop,
            face_ratio: 0.0,
        }
    }
}

/// Crop window positions at sampled source-frame indices.
///
/// Positions between samples interpolate linearly; positions before the
/// first or after the last sample clamp to it.
#[derive(Debug, Clone)]
struct CropTrack {
    samples: Vec<(u32, f64, f64)>,
}

impl CropTrack {
    fn position_at(&self, frame: u32) -> (f64, f64) {
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];
        if frame <= first.0 {
            return (first.1, first.2);
        }
        if frame >= last.0 {
            return (last.1, last.2);
        }
        for window in self.samples.windows(2) {
            let (f0, x0, y0) = window[0];
            let (f1, x1, y1) = window[1];
            if frame >= f0 && frame <= f1 {
                let t = (frame - f0) as f64 / (f1 - f0) as f64;
                return (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
            }
        }
        (last.1, last.2)
    }
}

/// Analyze a video and produce the crop filter for vertical output.
///
/// Degrades to [`CENTER_CROP_FILTER`] on any probe, extraction or detection
/// problem.
pub async fn analyze_crop(
    tools: &Tools,
    detector: Arc<dyn FaceDetector>,
    video: &Path,
    config: &CropConfig,
) -> CropAnalysis {
    match try_analyze(tools, detector, video, config).await {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, "Crop analysis failed, using center crop");
            CropAnalysis::center_fallback()
        }
    }
}

async fn try_analyze(
    tools: &Tools,
    detector: Arc<dyn FaceDetector>,
    video: &Path,
    config: &CropConfig,
) -> MediaResult<CropAnalysis> {
    let info = probe_video(tools, video).await?;
    let (crop_w, crop_h) = crop_box_size(info.width, info.height, config.target_aspect());

    let workdir = tempfile::tempdir()?;
    let frames = extract_sample_frames(tools, video, workdir.path(), config.sample_stride).await?;
    if frames.is_empty() {
        warn!("No frames sampled, using center crop");
        return Ok(CropAnalysis::center_fallback());
    }

    let mut raw: Vec<(f64, f64)> = Vec::with_capacity(frames.len());
    let mut frames_with_faces = 0usize;
    for frame in &frames {
        // A single failed detection reads as "no faces" for that sample.
        let faces = match detector.detect(frame).await {
            Ok(faces) => faces,
            Err(e) => {
                debug!(error = %e, frame = %frame.display(), "Detection failed for sample");
                Vec::new()
            }
        };
        if !faces.is_empty() {
            frames_with_faces += 1;
        }
        let window = place_window(&faces, crop_w, crop_h, info.width, info.height, config.headroom);
        raw.push((window.x as f64, window.y as f64));
    }

    let face_ratio = frames_with_faces as f64 / frames.len() as f64;
    let strategy = CropStrategy::from_face_ratio(face_ratio);
    let smoothed = smooth_positions(&raw, config.smoothing);

    let track = CropTrack {
        samples: smoothed
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| (i as u32 * config.sample_stride, x, y))
            .collect(),
    };

    // Collapse the trajectory to its per-frame average; a static crop avoids
    // the wobble a literal follow-cam would add.
    let total_frames = info.frame_count().max(1) as u32;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for frame in 0..total_frames {
        let (x, y) = track.position_at(frame);
        sum_x += x;
        sum_y += y;
    }
    let avg_x = (sum_x / total_frames as f64).round() as u32;
    let avg_y = (sum_y / total_frames as f64).round() as u32;

    let filter = format!(
        "crop={}:{}:{}:{},scale={}:{}",
        crop_w, crop_h, avg_x, avg_y, config.target_width, config.target_height
    );
    info!(
        strategy = strategy.as_str(),
        face_ratio,
        filter = %filter,
        "Crop analysis complete"
    );

    Ok(CropAnalysis {
        filter,
        strategy,
        face_ratio,
    })
}

/// Largest crop box with the target aspect that fits inside the frame.
fn crop_box_size(frame_w: u32, frame_h: u32, target_aspect: f64) -> (u32, u32) {
    let source_aspect = frame_w as f64 / frame_h as f64;
    if source_aspect > target_aspect {
        // Wider than target: full height, trimmed width.
        let crop_h = frame_h;
        let crop_w = (crop_h as f64 * target_aspect).round() as u32;
        (crop_w.min(frame_w), crop_h)
    } else {
        // Taller or equal: full width, trimmed height.
        let crop_w = frame_w;
        let crop_h = (crop_w as f64 / target_aspect).round() as u32;
        (crop_w, crop_h.min(frame_h))
    }
}

/// Place the crop window for one sampled frame.
///
/// No faces centers the window. One face centers it horizontally on the
/// face with the face at the headroom line. Multiple faces average the
/// top three by confidence, then follow the single-face rule.
fn place_window(
    faces: &[FaceRegion],
    crop_w: u32,
    crop_h: u32,
    frame_w: u32,
    frame_h: u32,
    headroom: f64,
) -> CropWindow {
    let target = match faces {
        [] => {
            return CropWindow::clamped(
                (frame_w as i64 - crop_w as i64) / 2,
                (frame_h as i64 - crop_h as i64) / 2,
                crop_w,
                crop_h,
                frame_w,
                frame_h,
            );
        }
        [only] => (only.center_x, only.center_y),
        _ => {
            let mut ranked: Vec<&FaceRegion> = faces.iter().collect();
            ranked.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let top = &ranked[..ranked.len().min(3)];
            let n = top.len() as f64;
            (
                top.iter().map(|f| f.center_x).sum::<f64>() / n,
                top.iter().map(|f| f.center_y).sum::<f64>() / n,
            )
        }
    };

    let desired_x = (target.0 - crop_w as f64 / 2.0).round() as i64;
    let desired_y = (target.1 - headroom * crop_h as f64).round() as i64;
    CropWindow::clamped(desired_x, desired_y, crop_w, crop_h, frame_w, frame_h)
}

/// Exponential smoothing seeded with the first raw sample.
fn smooth_positions(raw: &[(f64, f64)], alpha: f64) -> Vec<(f64, f64)> {
    let mut smoothed = Vec::with_capacity(raw.len());
    for &(x, y) in raw {
        let next = match smoothed.last() {
            None => (x, y),
            Some(&(px, py)) => (alpha * px + (1.0 - alpha) * x, alpha * py + (1.0 - alpha) * y),
        };
        smoothed.push(next);
    }
    smoothed
}

/// One FFmpeg pass dumping every Nth frame as a JPEG, returned in order.
async fn extract_sample_frames(
    tools: &Tools,
    video: &Path,
    workdir: &Path,
    stride: u32,
) -> MediaResult<Vec<std::path::PathBuf>> {
    let pattern = workdir.join("frame_%05d.jpg");
    let cmd = FfmpegCommand::new(video, &pattern)
        .video_filter(format!("select='not(mod(n,{stride}))'"))
        .output_args(["-vsync", "vfr", "-q:v", "2"]);
    FfmpegRunner::new(tools).run(&cmd).await?;

    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(workdir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(cx: f64, cy: f64, confidence: f64) -> FaceRegion {
        FaceRegion {
            center_x: cx,
            center_y: cy,
            width: 100.0,
            height: 120.0,
            confidence,
        }
    }

    #[test]
    fn test_crop_box_size_wide_source() {
        // 1920x1080 at 9:16 keeps full height.
        let (w, h) = crop_box_size(1920, 1080, 9.0 / 16.0);
        assert_eq!(h, 1080);
        assert_eq!(w, 608);
    }

    #[test]
    fn test_crop_box_size_tall_source() {
        // 1080x2400 is taller than 9:16, keeps full width.
        let (w, h) = crop_box_size(1080, 2400, 9.0 / 16.0);
        assert_eq!(w, 1080);
        assert_eq!(h, 1920);
    }

    #[test]
    fn test_window_always_inside_frame() {
        let (crop_w, crop_h) = crop_box_size(1920, 1080, 9.0 / 16.0);
        for cx in [0.0, 50.0, 960.0, 1900.0] {
            for cy in [0.0, 540.0, 1079.0] {
                let w = place_window(&[face(cx, cy, 0.9)], crop_w, crop_h, 1920, 1080, 0.35);
                assert!(w.fits_within(1920, 1080), "escaped at ({cx}, {cy}): {w:?}");
            }
        }
    }

    #[test]
    fn test_no_faces_centers_window() {
        let w = place_window(&[], 608, 1080, 1920, 1080, 0.35);
        assert_eq!(w.x, 656);
        assert_eq!(w.y, 0);
    }

    #[test]
    fn test_single_face_headroom_placement() {
        // Face at (960, 500) in 1920x1080, crop 608x1080. The window spans
        // the full frame height, so y clamps to 0; x centers on the face.
        let w = place_window(&[face(960.0, 500.0, 0.9)], 608, 1080, 1920, 1080, 0.35);
        assert_eq!(w.x, 960 - 304);
        assert_eq!(w.y, 0);
    }

    #[test]
    fn test_multi_face_uses_top_three_by_confidence() {
        let faces = vec![
            face(100.0, 500.0, 0.95),
            face(400.0, 500.0, 0.90),
            face(700.0, 500.0, 0.85),
            face(1900.0, 500.0, 0.10),
        ];
        let averaged = place_window(&faces, 608, 1080, 1920, 1080, 0.35);
        // Mean of the top three centers is 400; the outlier is ignored.
        assert_eq!(averaged.x, 400 - 304);
    }

    #[test]
    fn test_smoothing_seeds_with_first_sample() {
        let smoothed = smooth_positions(&[(100.0, 0.0), (200.0, 0.0)], 0.85);
        assert_eq!(smoothed[0], (100.0, 0.0));
        // 0.85 * 100 + 0.15 * 200
        assert!((smoothed[1].0 - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_step_converges_without_overshoot() {
        let mut raw = vec![(100.0, 0.0)];
        raw.extend(std::iter::repeat((200.0, 0.0)).take(20));
        let smoothed = smooth_positions(&raw, 0.85);
        for pair in smoothed.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
            assert!(pair[1].0 <= 200.0);
        }
        // Well on its way to the new position after 20 samples.
        assert!(smoothed.last().unwrap().0 > 190.0);
    }

    #[test]
    fn test_smoothing_constant_input_is_fixed_point() {
        let smoothed = smooth_positions(&[(300.0, 40.0); 5], 0.85);
        for &(x, y) in &smoothed {
            assert_eq!((x, y), (300.0, 40.0));
        }
    }

    #[test]
    fn test_track_interpolates_between_anchors() {
        let track = CropTrack {
            samples: vec![(0, 100.0, 0.0), (10, 200.0, 50.0)],
        };
        assert_eq!(track.position_at(0), (100.0, 0.0));
        assert_eq!(track.position_at(10), (200.0, 50.0));
        assert_eq!(track.position_at(5), (150.0, 25.0));
        // Clamped outside the sampled range.
        assert_eq!(track.position_at(100), (200.0, 50.0));
    }

    #[test]
    fn test_strategy_thresholds() {
        assert_eq!(CropStrategy::from_face_ratio(0.9), CropStrategy::FaceTracking);
        assert_eq!(CropStrategy::from_face_ratio(0.7), CropStrategy::MixedFaceCenter);
        assert_eq!(CropStrategy::from_face_ratio(0.5), CropStrategy::MixedFaceCenter);
        assert_eq!(CropStrategy::from_face_ratio(0.3), CropStrategy::CenterCrop);
        assert_eq!(CropStrategy::from_face_ratio(0.0), CropStrategy::CenterCrop);
    }
}
