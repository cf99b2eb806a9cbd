//! Encoding configuration.

use serde::{Deserialize, Serialize};

/// Encoder backend used for the vertical output.
///
/// The choice affects backend flags only; output dimensions, audio handling
/// and container flags are identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncoderBackend {
    /// NVIDIA hardware encoder, used when the transcoder advertises it.
    Nvenc,
    /// Software x264, always available.
    #[default]
    Libx264,
}

impl EncoderBackend {
    /// FFmpeg codec name.
    pub fn codec(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc => "h264_nvenc",
            EncoderBackend::Libx264 => "libx264",
        }
    }

    /// Backend-specific quality flags.
    pub fn quality_args(&self) -> Vec<String> {
        match self {
            EncoderBackend::Nvenc => {
                vec!["-preset".into(), "p4".into(), "-tune".into(), "hq".into()]
            }
            EncoderBackend::Libx264 => vec![
                "-preset".into(),
                "veryfast".into(),
                "-crf".into(),
                "23".into(),
            ],
        }
    }

    /// Whether to request hardware-accelerated decode on the input side.
    pub fn wants_hwaccel(&self) -> bool {
        matches!(self, EncoderBackend::Nvenc)
    }
}

/// Output encoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Output width in pixels.
    pub target_width: u32,
    /// Output height in pixels.
    pub target_height: u32,
    /// Audio bitrate string (e.g. "128k").
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            target_width: 1080,
            target_height: 1920,
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl EncodingConfig {
    /// Target aspect ratio as width / height.
    pub fn target_aspect(&self) -> f64 {
        self.target_width as f64 / self.target_height as f64
    }
}
