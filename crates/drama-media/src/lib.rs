//! FFmpeg CLI wrapper and media analysis for the ShortDrama worker.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress parsing from
//!   `-progress pipe:1`
//! - Video probing via FFprobe
//! - Source fetching (yt-dlp for known platforms, streamed HTTP otherwise)
//! - The face-detection capability (HTTP sidecar with a null fallback)
//! - The smart crop engine (face tracking, smoothing, interpolation)
//! - The smart thumbnail engine (candidate sampling and scoring)
//! - Encode orchestration with hardware/software backend selection

pub mod command;
pub mod detect;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod probe;
pub mod progress;
pub mod smartcrop;
pub mod thumbnail;

pub use command::{FfmpegCommand, FfmpegRunner, Tools};
pub use detect::{select_detector, FaceDetector, HttpFaceDetector, NullFaceDetector};
pub use encode::{encode_vertical, extract_segment, probe_encoder};
pub use error::{MediaError, MediaResult};
pub use fetch::{fetch_url, is_platform_url};
pub use probe::{probe_video, VideoInfo};
pub use progress::{EncodeProgress, ProgressGate};
pub use smartcrop::{analyze_crop, CropAnalysis, CropConfig, CropStrategy, CENTER_CROP_FILTER};
pub use thumbnail::{extract_middle_frame, generate_thumbnail, ThumbnailReport};
