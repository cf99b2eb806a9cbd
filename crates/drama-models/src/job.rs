//! Job definitions as delivered by the controller's worker API.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of job.
///
/// The controller may introduce new kinds; anything this worker does not
/// recognize is processed as a single whole-clip encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobKind {
    /// Encode the whole source into one vertical episode.
    #[default]
    #[serde(rename = "ENCODE_ONE")]
    EncodeOne,
    /// Split the source into bounded episodes, one encode per segment.
    #[serde(rename = "SPLIT_SERIES")]
    SplitSeries,
    /// Any kind this worker does not know about.
    #[serde(other)]
    Other,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::EncodeOne => "ENCODE_ONE",
            JobKind::SplitSeries => "SPLIT_SERIES",
            JobKind::Other => "OTHER",
        }
    }
}

/// A claimed transcoding job.
///
/// Immutable once claimed; the worker keeps progress bookkeeping locally and
/// reports terminal state exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID, assigned by the controller.
    pub id: JobId,

    /// Job kind; absent means a single whole-clip encode.
    #[serde(default)]
    pub kind: JobKind,

    /// Source reference: an object-store key in the raw bucket, or an
    /// http(s) URL. Required; a job without one is failed immediately.
    #[serde(default)]
    pub raw_key: Option<String>,

    /// Requested episode length for SPLIT_SERIES jobs, in seconds.
    #[serde(default)]
    pub series_episode_duration_sec: Option<u32>,

    /// Upper bound on emitted episodes for SPLIT_SERIES jobs.
    #[serde(default)]
    pub series_max_episodes: Option<u32>,
}

impl Job {
    /// Whether the source reference looks like a URL rather than an
    /// object-store key.
    pub fn source_is_url(&self) -> bool {
        self.raw_key
            .as_deref()
            .map(|s| s.starts_with("http://") || s.starts_with("https://"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_format() {
        let json = r#"{
            "id": "job-123",
            "kind": "SPLIT_SERIES",
            "rawKey": "uploads/source.mp4",
            "seriesEpisodeDurationSec": 180,
            "seriesMaxEpisodes": 10
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.id.as_str(), "job-123");
        assert_eq!(job.kind, JobKind::SplitSeries);
        assert_eq!(job.raw_key.as_deref(), Some("uploads/source.mp4"));
        assert_eq!(job.series_episode_duration_sec, Some(180));
        assert_eq!(job.series_max_episodes, Some(10));
        assert!(!job.source_is_url());
    }

    #[test]
    fn test_unknown_kind_falls_back() {
        let json = r#"{"id": "j", "kind": "RESTITCH", "rawKey": "k"}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.kind, JobKind::Other);
    }

    #[test]
    fn test_minimal_job_defaults() {
        let json = r#"{"id": "j"}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.kind, JobKind::EncodeOne);
        assert!(job.raw_key.is_none());
    }

    #[test]
    fn test_url_source_detection() {
        let json = r#"{"id": "j", "rawKey": "https://youtu.be/abc123def45"}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert!(job.source_is_url());
    }
}
