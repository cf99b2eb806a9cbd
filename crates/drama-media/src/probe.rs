//! Video metadata probing via FFprobe.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::Tools;
use crate::error::{MediaError, MediaResult};

/// Basic stream and container metadata for a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
    pub fps: f64,
    pub codec: String,
}

impl VideoInfo {
    /// Source aspect ratio as width / height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Estimated total frame count.
    pub fn frame_count(&self) -> u64 {
        (self.duration_sec * self.fps).round() as u64
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe a video file for dimensions, duration and frame rate.
///
/// A file with no video stream or a non-positive duration is rejected as
/// invalid.
pub async fn probe_video(tools: &Tools, path: &Path) -> MediaResult<VideoInfo> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    let info = video_info_from_probe(parsed)
        .ok_or_else(|| MediaError::InvalidVideo(format!("no video stream in {}", path.display())))?;

    if info.duration_sec <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "non-positive duration in {}",
            path.display()
        )));
    }

    debug!(
        width = info.width,
        height = info.height,
        duration_sec = info.duration_sec,
        fps = info.fps,
        codec = %info.codec,
        "Probed video"
    );
    Ok(info)
}

fn video_info_from_probe(parsed: ProbeOutput) -> Option<VideoInfo> {
    let stream = parsed.streams.iter().find(|s| {
        s.codec_type.as_deref() == Some("video") && s.width.is_some() && s.height.is_some()
    })?;
    let duration_sec = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .unwrap_or(0.0);

    Some(VideoInfo {
        width: stream.width?,
        height: stream.height?,
        duration_sec,
        fps,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse FFprobe's "num/den" frame-rate notation.
fn parse_rational(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264",
                 "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "123.456000"}
        }"#;
        let parsed: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = video_info_from_probe(parsed).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration_sec - 123.456).abs() < 1e-9);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.codec, "h264");
        assert!(info.aspect() > 1.0);
        assert_eq!(info.frame_count(), 3700);
    }

    #[test]
    fn test_missing_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "10.0"}}"#;
        let parsed: ProbeOutput = serde_json::from_str(json).unwrap();
        assert!(video_info_from_probe(parsed).is_none());
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("30/1"), Some(30.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("25"), Some(25.0));
    }
}
