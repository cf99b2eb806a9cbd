//! Result payloads reported back to the controller, and the per-episode
//! metadata artifact.

use serde::{Deserialize, Serialize};

/// Artifact keys and duration for one completed episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResult {
    pub episode_number: u32,
    pub video_key: String,
    pub thumbnail_key: String,
    pub subtitles_key: String,
    pub metadata_key: String,
    pub duration_sec: u32,
}

/// Terminal completion payload for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    /// A single whole-clip encode.
    #[serde(rename_all = "camelCase")]
    Single {
        video_key: String,
        thumbnail_key: String,
        subtitles_key: String,
        metadata_key: String,
        duration_sec: u32,
    },
    /// A SPLIT_SERIES job: one descriptor per emitted episode, in
    /// episode-number order.
    Series { segments: Vec<SegmentResult> },
}

/// Per-episode metadata JSON uploaded alongside the video artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub episode_title: String,
    /// Duration formatted as `mm:ss`.
    pub duration: String,
    /// BCP-47 language tag of the episode audio.
    pub language: String,
    pub thumbnail: String,
    pub video: String,
    pub subtitles: String,
}

impl EpisodeMetadata {
    /// Build metadata for one episode from its artifact keys.
    pub fn new(title: impl Into<String>, duration_sec: u32, language: impl Into<String>) -> Self {
        Self {
            episode_title: title.into(),
            duration: format_duration_mmss(duration_sec),
            language: language.into(),
            thumbnail: String::new(),
            video: String::new(),
            subtitles: String::new(),
        }
    }

    pub fn with_artifacts(
        mut self,
        video: impl Into<String>,
        thumbnail: impl Into<String>,
        subtitles: impl Into<String>,
    ) -> Self {
        self.video = video.into();
        self.thumbnail = thumbnail.into();
        self.subtitles = subtitles.into();
        self
    }
}

/// Format seconds as `mm:ss`. Minutes are not wrapped at an hour; a
/// 75-minute episode formats as `75:00`.
pub fn format_duration_mmss(duration_sec: u32) -> String {
    format!("{:02}:{:02}", duration_sec / 60, duration_sec % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_mmss(0), "00:00");
        assert_eq!(format_duration_mmss(59), "00:59");
        assert_eq!(format_duration_mmss(180), "03:00");
        assert_eq!(format_duration_mmss(4500), "75:00");
    }

    #[test]
    fn test_single_result_wire_format() {
        let result = JobResult::Single {
            video_key: "processed/j_20250101_000000.mp4".to_string(),
            thumbnail_key: "processed/j_20250101_000000.jpg".to_string(),
            subtitles_key: "processed/j_20250101_000000.srt".to_string(),
            metadata_key: "processed/j_20250101_000000.json".to_string(),
            duration_sec: 120,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["videoKey"], "processed/j_20250101_000000.mp4");
        assert_eq!(json["durationSec"], 120);
        assert!(json.get("segments").is_none());
    }

    #[test]
    fn test_series_result_wire_format() {
        let result = JobResult::Series {
            segments: vec![SegmentResult {
                episode_number: 1,
                video_key: "v".to_string(),
                thumbnail_key: "t".to_string(),
                subtitles_key: "s".to_string(),
                metadata_key: "m".to_string(),
                duration_sec: 150,
            }],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["segments"][0]["episodeNumber"], 1);
        assert_eq!(json["segments"][0]["durationSec"], 150);
    }

    #[test]
    fn test_episode_metadata_round_trip() {
        let meta = EpisodeMetadata::new("Episode 3", 185, "ur").with_artifacts(
            "processed/j_ep003.mp4",
            "processed/j_ep003.jpg",
            "processed/j_ep003.srt",
        );

        assert_eq!(meta.duration, "03:05");
        let json = serde_json::to_string(&meta).unwrap();
        let back: EpisodeMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
