//! Encode orchestration: backend probing and vertical output encoding.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner, Tools};
use crate::error::MediaResult;
use crate::probe::probe_video;
use crate::progress::ProgressGate;
use drama_models::{EncoderBackend, EncodingConfig, Segment};

/// Probe the transcoder for hardware encoding support.
///
/// Run once per job; the backend never changes mid-job. Any probe failure
/// reads as "software only".
pub async fn probe_encoder(tools: &Tools) -> EncoderBackend {
    let output = Command::new(&tools.ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .await;

    let backend = match output {
        Ok(out) if out.status.success() => {
            if String::from_utf8_lossy(&out.stdout).contains("h264_nvenc") {
                EncoderBackend::Nvenc
            } else {
                EncoderBackend::Libx264
            }
        }
        _ => EncoderBackend::Libx264,
    };
    info!(codec = backend.codec(), "Selected encoder backend");
    backend
}

/// Encode a vertical clip with the given filter chain.
///
/// When `segment` is set, the seek and duration are applied on the output
/// side so the encoded range matches what was analyzed. Progress callbacks
/// fire on two-point deltas clamped to 99; 100 is reported exactly once,
/// after the process exits cleanly. A non-zero exit is fatal.
pub async fn encode_vertical<F>(
    tools: &Tools,
    input: &Path,
    output: &Path,
    filter: &str,
    segment: Option<&Segment>,
    backend: EncoderBackend,
    encoding: &EncodingConfig,
    mut on_progress: F,
) -> MediaResult<()>
where
    F: FnMut(u8),
{
    let total_sec = match segment {
        Some(seg) => seg.duration_sec as f64,
        None => probe_video(tools, input).await?.duration_sec,
    };

    let mut cmd = FfmpegCommand::new(input, output);
    if backend.wants_hwaccel() {
        cmd = cmd.input_arg("-hwaccel").input_arg("auto");
    }
    if let Some(seg) = segment {
        cmd = cmd.seek(seg.start_sec).duration(seg.duration_sec);
    }
    cmd = cmd
        .video_filter(filter)
        .video_codec(backend.codec())
        .output_args(backend.quality_args())
        .audio_codec("aac")
        .audio_bitrate(&encoding.audio_bitrate)
        .output_args(["-movflags", "+faststart"])
        .with_progress();

    let mut gate = ProgressGate::new();
    FfmpegRunner::new(tools)
        .run_with_progress(&cmd, |progress| {
            if let Some(pct) = progress.percent(total_sec) {
                if let Some(reported) = gate.observe(pct) {
                    on_progress(reported);
                }
            }
        })
        .await?;

    on_progress(100);
    debug!(output = %output.display(), "Encode complete");
    Ok(())
}

/// Stream-copy a segment out of the source so downstream analysis sees
/// exactly the content that will be encoded.
pub async fn extract_segment(
    tools: &Tools,
    input: &Path,
    output: &Path,
    segment: &Segment,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .seek(segment.start_sec)
        .duration(segment.duration_sec)
        .output_args(["-c", "copy"]);
    FfmpegRunner::new(tools).run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> Segment {
        Segment {
            episode_number: 1,
            start_sec: 60,
            duration_sec: 180,
        }
    }

    #[test]
    fn test_encode_command_shape_software() {
        let seg = segment();
        let mut cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let backend = EncoderBackend::Libx264;
        assert!(!backend.wants_hwaccel());
        cmd = cmd
            .seek(seg.start_sec)
            .duration(seg.duration_sec)
            .video_filter("crop=608:1080:656:0,scale=1080:1920")
            .video_codec(backend.codec())
            .output_args(backend.quality_args())
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_args(["-movflags", "+faststart"])
            .with_progress();

        let args = cmd.build_args();
        assert!(!args.contains(&"-hwaccel".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"veryfast".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"pipe:1".to_string()));
    }

    #[test]
    fn test_hwaccel_is_an_input_flag() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4")
            .input_arg("-hwaccel")
            .input_arg("auto")
            .video_codec(EncoderBackend::Nvenc.codec());
        let args = cmd.build_args();
        let hw_pos = args.iter().position(|a| a == "-hwaccel").unwrap();
        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(hw_pos < i_pos);
        assert!(args.contains(&"h264_nvenc".to_string()));
    }

    #[test]
    fn test_extract_uses_stream_copy() {
        let seg = segment();
        let cmd = FfmpegCommand::new("in.mp4", "seg.mp4")
            .seek(seg.start_sec)
            .duration(seg.duration_sec)
            .output_args(["-c", "copy"]);
        let args = cmd.build_args();
        let c_pos = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[c_pos + 1], "copy");
        assert!(args.contains(&"60".to_string()));
        assert!(args.contains(&"180".to_string()));
    }
}
