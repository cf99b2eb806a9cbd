//! Smart thumbnail selection.
//!
//! Samples candidate frames across the video, scores each on brightness,
//! sharpness and face presence, and keeps the best one. The caller falls
//! back to a plain middle-frame grab when no candidate can be extracted.

use image::imageops::FilterType;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner, Tools};
use crate::detect::FaceDetector;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use drama_models::FaceRegion;

const THUMB_WIDTH: u32 = 1080;
const THUMB_HEIGHT: u32 = 1920;

const BRIGHTNESS_MAX: f64 = 40.0;
const SHARPNESS_MAX: f64 = 30.0;
const FACE_MAX: f64 = 40.0;

/// Outcome of thumbnail selection.
#[derive(Debug, Clone)]
pub struct ThumbnailReport {
    pub output: PathBuf,
    /// Timestamp of the winning frame, in seconds.
    pub timestamp: f64,
    pub candidate_index: usize,
    pub score: f64,
}

/// Pick the best thumbnail for a video and write it to `output`.
///
/// Candidate JPEGs are kept in a `thumb-candidates/` directory beside the
/// output for inspection. Fails with [`MediaError::NoThumbnailCandidates`]
/// when no frame could be extracted.
pub async fn generate_thumbnail(
    tools: &Tools,
    detector: Arc<dyn FaceDetector>,
    video: &Path,
    output: &Path,
) -> MediaResult<ThumbnailReport> {
    let info = probe_video(tools, video).await?;
    let timestamps = candidate_timestamps(info.duration_sec);

    let candidates_dir = output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("thumb-candidates");
    tokio::fs::create_dir_all(&candidates_dir).await?;

    let runner = FfmpegRunner::new(tools);
    let mut candidates: Vec<(usize, f64, PathBuf)> = Vec::new();
    for (i, &ts) in timestamps.iter().enumerate() {
        let path = candidates_dir.join(format!("candidate_{i:02}.jpg"));
        let cmd = FfmpegCommand::new(video, &path)
            .output_arg("-ss")
            .output_arg(format!("{ts:.3}"))
            .single_frame()
            .output_args(["-q:v", "2"]);
        match runner.run(&cmd).await {
            Ok(()) if path.exists() => candidates.push((i, ts, path)),
            Ok(()) => debug!(ts, "Candidate frame not written"),
            Err(e) => debug!(ts, error = %e, "Candidate extraction failed"),
        }
    }

    if candidates.is_empty() {
        return Err(MediaError::NoThumbnailCandidates);
    }

    let mut scores: Vec<f64> = Vec::with_capacity(candidates.len());
    for (_, _, path) in &candidates {
        scores.push(score_candidate(detector.clone(), path).await);
    }

    let best = pick_best(&scores).unwrap_or(0);
    let (candidate_index, timestamp, winner) = candidates[best].clone();
    info!(
        timestamp,
        score = scores[best],
        candidate = candidate_index,
        "Selected thumbnail"
    );

    let img = image::open(&winner)?;
    img.resize_exact(THUMB_WIDTH, THUMB_HEIGHT, FilterType::Lanczos3)
        .save(output)?;

    Ok(ThumbnailReport {
        output: output.to_path_buf(),
        timestamp,
        candidate_index,
        score: scores[best],
    })
}

/// Fixed fallback: a single frame from the middle of the video.
pub async fn extract_middle_frame(tools: &Tools, video: &Path, output: &Path) -> MediaResult<()> {
    let info = probe_video(tools, video).await?;
    let midpoint = info.duration_sec / 2.0;
    let cmd = FfmpegCommand::new(video, output)
        .output_arg("-ss")
        .output_arg(format!("{midpoint:.3}"))
        .single_frame()
        .output_args(["-q:v", "2"]);
    FfmpegRunner::new(tools).run(&cmd).await
}

/// Candidate timestamps across the video.
///
/// An opening window of `min(2s, 10%)` is skipped, then six probes spread
/// over the remainder. Probes past the end are dropped, the survivors are
/// clamped to half a second before the end.
fn candidate_timestamps(duration_sec: f64) -> Vec<f64> {
    let skip = (duration_sec * 0.1).min(2.0);
    let effective = duration_sec - skip;
    let raw = [
        skip + 1.0,
        skip + effective * 0.1,
        skip + effective * 0.25,
        skip + effective * 0.5,
        skip + effective * 0.75,
        skip + effective * 0.9,
    ];

    let mut timestamps: Vec<f64> = raw
        .iter()
        .filter(|&&ts| ts < duration_sec)
        .map(|&ts| ts.min(duration_sec - 0.5))
        .filter(|&ts| ts >= 0.0)
        .collect();
    timestamps.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    timestamps
}

async fn score_candidate(detector: Arc<dyn FaceDetector>, path: &Path) -> f64 {
    let gray = match image::open(path) {
        Ok(img) => img.to_luma8(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable candidate");
            return 0.0;
        }
    };

    let brightness = brightness_score(mean_luma(&gray));
    let sharpness = sharpness_score(laplacian_variance(&gray));
    let faces = detector.detect(path).await.unwrap_or_default();
    let face = face_score(&faces, gray.width(), gray.height());

    let total = total_score(brightness, sharpness, face);
    debug!(
        path = %path.display(),
        brightness,
        sharpness,
        face,
        total,
        "Scored candidate"
    );
    total
}

/// Brightness component: full marks for mid-range exposure, linear decay
/// toward pure black or pure white.
fn brightness_score(mean: f64) -> f64 {
    let penalty = if mean < 0.3 {
        (0.3 - mean) / 0.3
    } else if mean > 0.7 {
        (mean - 0.7) / 0.3
    } else {
        0.0
    };
    (BRIGHTNESS_MAX * (1.0 - penalty)).max(0.0)
}

/// Sharpness component from Laplacian variance, saturating at 500.
fn sharpness_score(laplacian_var: f64) -> f64 {
    SHARPNESS_MAX * (laplacian_var / 500.0).min(1.0)
}

/// Face component: zero without faces, otherwise a base score plus small
/// bonuses for extra faces and for any face sitting near the center of the
/// frame. The center bonus is the best over all faces, so a well-placed
/// weak detection still counts.
fn face_score(faces: &[FaceRegion], img_w: u32, img_h: u32) -> f64 {
    if faces.is_empty() {
        return 0.0;
    }

    let mut score = 30.0;
    score += ((faces.len() - 1).min(3)) as f64 * 3.33;

    let mut center_bonus = 0.0f64;
    for face in faces {
        let dx = face.center_x / img_w as f64 - 0.5;
        let dy = face.center_y / img_h as f64 - 0.5;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 0.3 {
            center_bonus = center_bonus.max(5.0 * (1.0 - dist / 0.3));
        }
    }
    score += center_bonus;

    score.min(FACE_MAX)
}

/// The face bonuses can push the component sum past 100; the reported total
/// never exceeds it.
fn total_score(brightness: f64, sharpness: f64, face: f64) -> f64 {
    (brightness + sharpness + face).clamp(0.0, 100.0)
}

fn mean_luma(gray: &GrayImage) -> f64 {
    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    sum as f64 / (gray.width() as u64 * gray.height() as u64) as f64 / 255.0
}

/// Variance of the 4-neighbor Laplacian response over interior pixels.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width(), gray.height());
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = gray.get_pixel(x, y).0[0] as f64;
            let neighbors = gray.get_pixel(x - 1, y).0[0] as f64
                + gray.get_pixel(x + 1, y).0[0] as f64
                + gray.get_pixel(x, y - 1).0[0] as f64
                + gray.get_pixel(x, y + 1).0[0] as f64;
            responses.push(neighbors - 4.0 * center);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
}

/// Arg-max with ties broken toward the earliest candidate.
fn pick_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}
