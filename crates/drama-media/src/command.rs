//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::progress::{parse_progress_line, EncodeProgress};

/// Resolved external tool paths.
///
/// Discovered once at startup and passed explicitly wherever a subprocess is
/// spawned; there is no ambient global binary path.
#[derive(Debug, Clone)]
pub struct Tools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Optional; only needed for platform URL sources.
    pub ytdlp: Option<PathBuf>,
}

impl Tools {
    /// Resolve tool paths from PATH. FFmpeg and FFprobe are required,
    /// yt-dlp is optional.
    pub fn resolve() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let ffprobe = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        let ytdlp = which::which("yt-dlp").ok();

        Ok(Self {
            ffmpeg,
            ffprobe,
            ytdlp,
        })
    }

    pub fn ytdlp(&self) -> MediaResult<&Path> {
        self.ytdlp.as_deref().ok_or(MediaError::YtDlpNotFound)
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to stream progress markers on stdout
    progress: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            progress: false,
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Start the output this far into the input. Applied on the output side
    /// (after `-i`) for frame-accurate segment boundaries.
    pub fn seek(self, seconds: u32) -> Self {
        self.output_arg("-ss").output_arg(seconds.to_string())
    }

    /// Limit output duration.
    pub fn duration(self, seconds: u32) -> Self {
        self.output_arg("-t").output_arg(seconds.to_string())
    }

    /// Set the video filter chain.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Stream machine-readable progress on stdout.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    /// Build the argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        if self.progress {
            args.push("-progress".to_string());
            args.push("pipe:1".to_string());
            args.push("-nostats".to_string());
        }

        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runner for FFmpeg commands.
///
/// Holds the resolved binary path; no timeout is enforced — a stuck
/// transcoder blocks the worker until killed externally.
pub struct FfmpegRunner {
    ffmpeg: PathBuf,
}

impl FfmpegRunner {
    pub fn new(tools: &Tools) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
        }
    }

    /// Run an FFmpeg command to completion, discarding progress.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command, invoking the callback for each progress block
    /// parsed from stdout. Returns only after the process exits; a non-zero
    /// exit is an error carrying the stderr tail.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, mut on_progress: F) -> MediaResult<()>
    where
        F: FnMut(&EncodeProgress),
    {
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.ffmpeg.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("FFmpeg stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("FFmpeg stderr not captured"))?;

        // Collect stderr in the background so a chatty transcoder cannot
        // deadlock against the stdout read loop.
        let stderr_handle = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        // Progress markers are consumed line-by-line on this task; no
        // further concurrency is needed.
        let mut lines = BufReader::new(stdout).lines();
        let mut current = EncodeProgress::default();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(progress) = parse_progress_line(&line, &mut current) {
                on_progress(&progress);
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(tail(&stderr_text, 2000)),
                status.code(),
            ))
        }
    }
}

/// Last `max` characters of a string, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        s.chars().skip(count - max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10)
            .duration(30)
            .video_codec("libx264")
            .video_filter("crop=608:1080:656:0,scale=1080:1920");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        // Seek comes after the input so analysis matches the encoded range.
        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        assert!(ss_pos > i_pos);
    }

    #[test]
    fn test_progress_flags_precede_output() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4").with_progress();
        let args = cmd.build_args();
        let progress_pos = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[progress_pos + 1], "pipe:1");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_tail_truncates_on_char_boundary() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("héllo", 4), "éllo");
        assert_eq!(tail("ab", 10), "ab");
    }
}
