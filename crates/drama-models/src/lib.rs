//! Shared data models for the ShortDrama worker.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs claimed from the controller's worker API
//! - Crop geometry (face regions, crop windows)
//! - Episode segmentation plans
//! - Result payloads and per-episode metadata
//! - Encoding configuration

pub mod encoding;
pub mod geometry;
pub mod job;
pub mod plan;
pub mod result;

pub use encoding::{EncoderBackend, EncodingConfig};
pub use geometry::{CropWindow, FaceRegion};
pub use job::{Job, JobId, JobKind};
pub use plan::{plan_segments, Segment, MAX_SEGMENTS_DEFAULT, MIN_SEGMENT_SEC, MIN_TAIL_SEC};
pub use result::{format_duration_mmss, EpisodeMetadata, JobResult, SegmentResult};
