//! ShortDrama transcoding worker.
//!
//! Claims jobs from the controller's queue API, converts source videos into
//! vertical 9:16 episodes with face-aware cropping and smart thumbnails,
//! and uploads the artifacts to object storage.

mod config;
mod error;
mod logging;
mod pipeline;
mod runner;

use anyhow::Context;
use tracing::info;

use config::WorkerConfig;
use drama_media::{select_detector, Tools};
use drama_queue::{QueueClient, QueueConfig};
use drama_storage::{S3Config, StorageClient};
use pipeline::Pipeline;
use runner::Runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();
    logging::init();

    let config = WorkerConfig::from_env();
    let tools = Tools::resolve().context("resolving media tools")?;
    info!(
        ffmpeg = %tools.ffmpeg.display(),
        ffprobe = %tools.ffprobe.display(),
        ytdlp = tools.ytdlp.is_some(),
        "Resolved media tools"
    );

    let detector = select_detector(config.face_service_url.as_deref()).await;
    let queue = QueueClient::new(QueueConfig::from_env().context("queue configuration")?);
    let storage = StorageClient::new(&S3Config::from_env());

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", config.work_dir.display()))?;

    let poll_interval = config.poll_interval;
    let claim_backoff = config.claim_backoff;
    let pipeline = Pipeline::new(tools, detector, queue.clone(), storage, config);
    let runner = Runner::new(queue, pipeline, poll_interval, claim_backoff);

    tokio::select! {
        _ = runner.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
