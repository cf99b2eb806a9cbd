//! Per-job processing: fetch, segment, crop, encode, thumbnail, upload.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use drama_media::{
    analyze_crop, encode_vertical, extract_middle_frame, extract_segment, fetch_url,
    generate_thumbnail, probe_encoder, probe_video, FaceDetector, Tools,
};
use drama_models::{
    plan_segments, EncoderBackend, EpisodeMetadata, Job, JobId, JobKind, JobResult, Segment,
    SegmentResult,
};
use drama_queue::QueueClient;
use drama_storage::StorageClient;

const SUBTITLES_PLACEHOLDER: &str = "1\n00:00:00,000 --> 00:00:02,000\n(POC subtitles)\n";
const EPISODE_TITLE: &str = "POC Episode";
const EPISODE_LANGUAGE: &str = "ur";

/// Artifact keys for one emitted clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub video: String,
    pub thumbnail: String,
    pub subtitles: String,
    pub metadata: String,
}

impl ArtifactKeys {
    /// Keys for a whole-clip encode: `processed/{jobId}_{stamp}.{ext}`.
    pub fn single(job_id: &JobId, stamp: &str) -> Self {
        Self::from_base(format!("processed/{job_id}_{stamp}"))
    }

    /// Keys for one series episode:
    /// `processed/{jobId}_{stamp}_ep{NNN}.{ext}`.
    pub fn episode(job_id: &JobId, stamp: &str, episode_number: u32) -> Self {
        Self::from_base(format!("processed/{job_id}_{stamp}_ep{episode_number:03}"))
    }

    fn from_base(base: String) -> Self {
        Self {
            video: format!("{base}.mp4"),
            thumbnail: format!("{base}.jpg"),
            subtitles: format!("{base}.srt"),
            metadata: format!("{base}.json"),
        }
    }
}

/// Local artifact paths produced for one clip.
struct ClipOutput {
    video: PathBuf,
    thumbnail: PathBuf,
    subtitles: PathBuf,
    metadata: PathBuf,
    duration_sec: u32,
}

/// Drives one claimed job from source fetch to terminal result.
pub struct Pipeline {
    tools: Tools,
    detector: Arc<dyn FaceDetector>,
    queue: QueueClient,
    storage: StorageClient,
    http: reqwest::Client,
    config: WorkerConfig,
}

impl Pipeline {
    pub fn new(
        tools: Tools,
        detector: Arc<dyn FaceDetector>,
        queue: QueueClient,
        storage: StorageClient,
        config: WorkerConfig,
    ) -> Self {
        Self {
            tools,
            detector,
            queue,
            storage,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Process a claimed job to completion.
    ///
    /// The scratch directory is removed afterwards regardless of outcome;
    /// the terminal report is the caller's responsibility.
    pub async fn process(&self, job: &Job) -> WorkerResult<JobResult> {
        let workdir = self.config.work_dir.join(format!("job_{}", job.id));
        tokio::fs::create_dir_all(&workdir).await?;

        let result = self.process_in(job, &workdir).await;
        if let Err(e) = tokio::fs::remove_dir_all(&workdir).await {
            warn!(job_id = %job.id, error = %e, "Scratch cleanup failed");
        }
        result
    }

    async fn process_in(&self, job: &Job, workdir: &Path) -> WorkerResult<JobResult> {
        let raw_key = job
            .raw_key
            .as_deref()
            .ok_or_else(|| WorkerError::job("Missing rawKey on job"))?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let input = workdir.join("input.mp4");

        info!(job_id = %job.id, kind = job.kind.as_str(), raw_key, "Processing job");
        self.report(&job.id, 0, "downloading", None).await;
        if job.source_is_url() {
            fetch_url(&self.tools, &self.http, raw_key, &input).await?;
        } else {
            self.storage
                .download_file(self.storage.bucket_raw(), raw_key, &input)
                .await?;
        }
        self.report(&job.id, 1, "downloaded", None).await;

        let backend = probe_encoder(&self.tools).await;

        match job.kind {
            JobKind::SplitSeries => self.split_series(job, workdir, &input, &stamp, backend).await,
            // Unknown kinds run the whole-clip pipeline too.
            JobKind::EncodeOne | JobKind::Other => {
                self.encode_single(job, workdir, &input, &stamp, backend).await
            }
        }
    }

    async fn encode_single(
        &self,
        job: &Job,
        workdir: &Path,
        input: &Path,
        stamp: &str,
        backend: EncoderBackend,
    ) -> WorkerResult<JobResult> {
        let out_dir = workdir.join("out");
        let clip = self
            .process_clip(&job.id, input, &out_dir, None, backend, true)
            .await?;

        let keys = ArtifactKeys::single(&job.id, stamp);
        self.upload_clip(&clip, &keys).await?;
        self.report(&job.id, 100, "uploaded", None).await;

        Ok(JobResult::Single {
            video_key: keys.video,
            thumbnail_key: keys.thumbnail,
            subtitles_key: keys.subtitles,
            metadata_key: keys.metadata,
            duration_sec: clip.duration_sec,
        })
    }

    async fn split_series(
        &self,
        job: &Job,
        workdir: &Path,
        input: &Path,
        stamp: &str,
        backend: EncoderBackend,
    ) -> WorkerResult<JobResult> {
        let total_sec = probe_video(&self.tools, input).await?.duration_sec.round() as u32;
        let requested = job.series_episode_duration_sec.unwrap_or(180);
        let plan = plan_segments(total_sec, requested, job.series_max_episodes);
        let count = plan.len();
        info!(job_id = %job.id, total_sec, requested, episodes = count, "Planned series");

        let mut segments = Vec::with_capacity(count);
        for (i, segment) in plan.iter().enumerate() {
            let ep = segment.episode_number;
            let pct = ((i as f64 / count as f64) * 100.0) as u8;
            self.report(
                &job.id,
                pct.max(1),
                &format!("split_encoding_ep_{ep}/{count}"),
                None,
            )
            .await;

            let out_dir = workdir.join(format!("out_{ep:03}"));
            let clip = self
                .process_clip(&job.id, input, &out_dir, Some(segment), backend, false)
                .await?;

            let keys = ArtifactKeys::episode(&job.id, stamp, ep);
            self.upload_clip(&clip, &keys).await?;
            segments.push(SegmentResult {
                episode_number: ep,
                video_key: keys.video,
                thumbnail_key: keys.thumbnail,
                subtitles_key: keys.subtitles,
                metadata_key: keys.metadata,
                duration_sec: clip.duration_sec,
            });

            let pct = (((i + 1) as f64 / count as f64) * 100.0) as u8;
            self.report(
                &job.id,
                pct.min(99),
                &format!("split_uploaded_ep_{ep}/{count}"),
                None,
            )
            .await;
        }

        self.report(&job.id, 100, "uploaded", None).await;
        Ok(JobResult::Series { segments })
    }

    /// Produce the four artifacts for one clip (whole source or segment).
    async fn process_clip(
        &self,
        job_id: &JobId,
        input: &Path,
        out_dir: &Path,
        segment: Option<&Segment>,
        backend: EncoderBackend,
        report_progress: bool,
    ) -> WorkerResult<ClipOutput> {
        tokio::fs::create_dir_all(out_dir).await?;
        let out_mp4 = out_dir.join("vertical.mp4");
        let out_jpg = out_dir.join("thumb.jpg");
        let out_srt = out_dir.join("subs.srt");
        let out_json = out_dir.join("meta.json");

        // Analyze the actual content being encoded: for a mid-source segment
        // that means a stream-copied extract, not the whole file.
        let mut analysis_input = input.to_path_buf();
        if let Some(seg) = segment.filter(|s| s.start_sec > 0) {
            let temp_segment = out_dir.join("temp_segment.mp4");
            match extract_segment(&self.tools, input, &temp_segment, seg).await {
                Ok(()) => analysis_input = temp_segment,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Segment extraction failed, analyzing full source");
                }
            }
        }

        if report_progress {
            self.report(job_id, 1, "analyzing", None).await;
        }
        let analysis = analyze_crop(&self.tools, self.detector.clone(), &analysis_input, &self.config.crop).await;
        info!(
            job_id = %job_id,
            strategy = analysis.strategy.as_str(),
            filter = %analysis.filter,
            "Crop analysis"
        );

        if report_progress {
            self.report(job_id, 1, "encoding", Some("starting ffmpeg")).await;
        }
        // encode_vertical's callback is synchronous; progress posts drain
        // through a channel so the encode loop never waits on the network.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<u8>();
        let reporter = if report_progress {
            let queue = self.queue.clone();
            let job_id = job_id.clone();
            Some(tokio::spawn(async move {
                while let Some(pct) = rx.recv().await {
                    if let Err(e) = queue.progress(&job_id, pct, "encoding", None).await {
                        warn!(job_id = %job_id, error = %e, "Progress report failed");
                    }
                }
            }))
        } else {
            None
        };

        let encode_result = encode_vertical(
            &self.tools,
            input,
            &out_mp4,
            &analysis.filter,
            segment,
            backend,
            &self.config.encoding,
            |pct| {
                let _ = tx.send(pct);
            },
        )
        .await;
        drop(tx);
        if let Some(handle) = reporter {
            let _ = handle.await;
        }
        encode_result?;

        tokio::fs::write(&out_srt, SUBTITLES_PLACEHOLDER).await?;

        // An unmeasurable output means the encode produced garbage; fatal.
        let duration_sec = probe_video(&self.tools, &out_mp4)
            .await
            .map_err(|e| WorkerError::job(format!("encoded clip has no duration: {e}")))?
            .duration_sec
            .round() as u32;

        match generate_thumbnail(&self.tools, self.detector.clone(), &out_mp4, &out_jpg).await {
            Ok(report) => {
                info!(job_id = %job_id, timestamp = report.timestamp, score = report.score, "Smart thumbnail selected");
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Smart thumbnail failed, extracting middle frame");
                extract_middle_frame(&self.tools, &out_mp4, &out_jpg).await?;
            }
        }

        let meta = EpisodeMetadata::new(EPISODE_TITLE, duration_sec, EPISODE_LANGUAGE)
            .with_artifacts("cdn_video_url", "thumb_url", "srt_url");
        tokio::fs::write(&out_json, serde_json::to_vec_pretty(&meta)?).await?;

        Ok(ClipOutput {
            video: out_mp4,
            thumbnail: out_jpg,
            subtitles: out_srt,
            metadata: out_json,
            duration_sec,
        })
    }

    async fn upload_clip(&self, clip: &ClipOutput, keys: &ArtifactKeys) -> WorkerResult<()> {
        let bucket = self.storage.bucket_processed();
        self.storage
            .upload_file(bucket, &keys.video, &clip.video, "video/mp4")
            .await?;
        self.storage
            .upload_file(bucket, &keys.thumbnail, &clip.thumbnail, "image/jpeg")
            .await?;
        self.storage
            .upload_file(bucket, &keys.subtitles, &clip.subtitles, "application/x-subrip")
            .await?;
        self.storage
            .upload_file(bucket, &keys.metadata, &clip.metadata, "application/json")
            .await?;
        Ok(())
    }

    /// Best-effort progress report: failures are logged, never escalated.
    async fn report(&self, job_id: &JobId, pct: u8, stage: &str, message: Option<&str>) {
        if let Err(e) = self.queue.progress(job_id, pct, stage, message).await {
            warn!(job_id = %job_id, stage, error = %e, "Progress report failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_key_pattern() {
        let job_id = JobId::from_string("job-42");
        let keys = ArtifactKeys::episode(&job_id, "20250101_120000", 7);
        assert_eq!(keys.video, "processed/job-42_20250101_120000_ep007.mp4");
        assert_eq!(keys.thumbnail, "processed/job-42_20250101_120000_ep007.jpg");
        assert_eq!(keys.subtitles, "processed/job-42_20250101_120000_ep007.srt");
        assert_eq!(keys.metadata, "processed/job-42_20250101_120000_ep007.json");
    }

    #[test]
    fn test_single_key_pattern() {
        let job_id = JobId::from_string("job-42");
        let keys = ArtifactKeys::single(&job_id, "20250101_120000");
        assert_eq!(keys.video, "processed/job-42_20250101_120000.mp4");
        assert_eq!(keys.metadata, "processed/job-42_20250101_120000.json");
    }

    #[test]
    fn test_episode_numbers_pad_to_three_digits() {
        let job_id = JobId::from_string("j");
        assert!(ArtifactKeys::episode(&job_id, "s", 1).video.contains("_ep001."));
        assert!(ArtifactKeys::episode(&job_id, "s", 123).video.contains("_ep123."));
    }

    #[test]
    fn test_subtitles_placeholder_is_valid_srt() {
        assert!(SUBTITLES_PLACEHOLDER.starts_with("1\n"));
        assert!(SUBTITLES_PLACEHOLDER.contains("00:00:00,000 --> 00:00:02,000"));
        assert!(SUBTITLES_PLACEHOLDER.ends_with('\n'));
    }
}
