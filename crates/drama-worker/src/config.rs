//! Worker configuration from the environment.

use drama_media::CropConfig;
use drama_models::EncodingConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for per-job scratch directories.
    pub work_dir: PathBuf,
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    /// Sleep after a failed claim attempt.
    pub claim_backoff: Duration,
    /// Base URL of the face-detection sidecar, if one is deployed.
    pub face_service_url: Option<String>,
    pub crop: CropConfig,
    pub encoding: EncodingConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("shortdrama"));
        let face_service_url = std::env::var("FACE_SERVICE_URL").ok().filter(|s| !s.is_empty());

        Self {
            work_dir,
            poll_interval: Duration::from_secs(2),
            claim_backoff: Duration::from_secs(3),
            face_service_url,
            crop: CropConfig::default(),
            encoding: EncodingConfig::default(),
        }
    }
}
