//! Source fetching: platform downloads via yt-dlp, plain HTTP otherwise.

use futures_util::StreamExt;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::Tools;
use crate::error::{MediaError, MediaResult};

const PLATFORM_HOSTS: &[&str] = &["youtube.com", "youtu.be", "tiktok.com", "instagram.com"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi"];

/// Whether a URL points at a platform that needs yt-dlp for extraction.
pub fn is_platform_url(url: &str) -> bool {
    PLATFORM_HOSTS.iter().any(|host| url.contains(host))
}

/// Fetch a source URL into `dest`.
///
/// Platform URLs go through yt-dlp; everything else is a streamed HTTP GET.
pub async fn fetch_url(
    tools: &Tools,
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> MediaResult<()> {
    if is_platform_url(url) {
        fetch_platform(tools, url, dest).await
    } else {
        fetch_http(http, url, dest).await
    }
}

/// Download via yt-dlp into an isolated temp directory, then move the video
/// into place. yt-dlp picks the final extension itself, so the directory is
/// scanned rather than trusting a fixed name.
async fn fetch_platform(tools: &Tools, url: &str, dest: &Path) -> MediaResult<()> {
    let ytdlp = tools.ytdlp()?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let workdir = tempfile::tempdir_in(parent)?;

    info!(url, "Downloading via yt-dlp");
    let output = Command::new(ytdlp)
        .args([
            "-f",
            "best[ext=mp4]/best",
            "--no-playlist",
            "--no-warnings",
            "-o",
        ])
        .arg(workdir.path().join("source.%(ext)s"))
        .arg(url)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed for {}: {}",
            url,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let downloaded = find_video_file(workdir.path()).await?.ok_or_else(|| {
        MediaError::download_failed(format!("yt-dlp produced no video file for {url}"))
    })?;

    move_file(&downloaded, dest).await?;
    debug!(dest = %dest.display(), "Platform download complete");
    Ok(())
}

/// Streamed HTTP GET; chunks are written as they arrive, the body is never
/// buffered whole.
async fn fetch_http(http: &reqwest::Client, url: &str, dest: &Path) -> MediaResult<()> {
    info!(url, "Downloading via HTTP");
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::download_failed(format!("GET {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(MediaError::download_failed(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| MediaError::download_failed(format!("stream from {url}: {e}")))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

async fn find_video_file(dir: &Path) -> MediaResult<Option<std::path::PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_video {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Rename with copy fallback for cross-device moves.
async fn move_file(from: &Path, to: &Path) -> MediaResult<()> {
    if tokio::fs::rename(from, to).await.is_err() {
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
