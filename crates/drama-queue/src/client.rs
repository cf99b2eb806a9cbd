//! HTTP client for the controller's worker job API.
//!
//! The claim endpoint is the only concurrency-control boundary in the
//! system: the controller hands each queued job to exactly one caller.
//! Everything else here is plain bearer-authenticated JSON over HTTP.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{QueueError, QueueResult};
use drama_models::{Job, JobId, JobResult};

const CLAIM_TIMEOUT: Duration = Duration::from_secs(20);
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(10);
const COMPLETE_TIMEOUT: Duration = Duration::from_secs(20);
const FAIL_TIMEOUT: Duration = Duration::from_secs(20);

/// Failure messages are truncated before reporting so a dumped stderr tail
/// cannot blow up the controller's row size.
const MAX_ERROR_CHARS: usize = 4000;

/// Queue API connection settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub base_url: String,
    pub worker_token: String,
}

impl QueueConfig {
    /// Read settings from the environment.
    ///
    /// `API_BASE_URL` defaults to the local controller; `WORKER_TOKEN` is
    /// required.
    pub fn from_env() -> QueueResult<Self> {
        let base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let worker_token = std::env::var("WORKER_TOKEN")
            .map_err(|_| QueueError::Config("WORKER_TOKEN must be set".to_string()))?;
        Ok(Self::new(base_url, worker_token))
    }

    pub fn new(base_url: impl Into<String>, worker_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            worker_token: worker_token.into(),
        }
    }
}

/// Client for claiming jobs and reporting their lifecycle.
#[derive(Debug, Clone)]
pub struct QueueClient {
    http: reqwest::Client,
    config: QueueConfig,
}

#[derive(Debug, Deserialize)]
struct ClaimResponse {
    job: Option<Job>,
}

#[derive(Debug, Serialize)]
struct ProgressBody<'a> {
    #[serde(rename = "progressPct")]
    progress_pct: u8,
    stage: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FailBody {
    error: String,
}

impl QueueClient {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Claim the next queued job, if any.
    pub async fn claim(&self) -> QueueResult<Option<Job>> {
        let response = self
            .http
            .post(self.url("/worker/jobs/claim"))
            .bearer_auth(&self.config.worker_token)
            .timeout(CLAIM_TIMEOUT)
            .send()
            .await?;

        let response = Self::check(response).await?;
        let claim: ClaimResponse = response.json().await?;
        if let Some(job) = &claim.job {
            debug!(job_id = %job.id, "Claimed job");
        }
        Ok(claim.job)
    }

    /// Report job progress. Best-effort at the call sites; this method still
    /// surfaces errors so callers can log them.
    pub async fn progress(
        &self,
        job_id: &JobId,
        pct: u8,
        stage: &str,
        message: Option<&str>,
    ) -> QueueResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/worker/jobs/{job_id}/progress")))
            .bearer_auth(&self.config.worker_token)
            .timeout(PROGRESS_TIMEOUT)
            .json(&ProgressBody {
                progress_pct: pct.min(100),
                stage,
                message,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Report a finished job with its artifact manifest.
    pub async fn complete(&self, job_id: &JobId, result: &JobResult) -> QueueResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/worker/jobs/{job_id}/complete")))
            .bearer_auth(&self.config.worker_token)
            .timeout(COMPLETE_TIMEOUT)
            .json(result)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Report a failed job with a truncated error message.
    pub async fn fail(&self, job_id: &JobId, error: &str) -> QueueResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/worker/jobs/{job_id}/fail")))
            .bearer_auth(&self.config.worker_token)
            .timeout(FAIL_TIMEOUT)
            .json(&FailBody {
                error: truncate_chars(error, MAX_ERROR_CHARS),
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> QueueResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(QueueError::http(status, body))
        }
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drama_models::JobKind;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> QueueClient {
        QueueClient::new(QueueConfig::new(server.uri(), "test-token"))
    }

    #[test]
    fn test_config_strips_trailing_slash() {
        let config = QueueConfig::new("http://localhost:3000/", "t");
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("abcdef", 4), "abcd");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        let long = "é".repeat(5000);
        assert_eq!(truncate_chars(&long, MAX_ERROR_CHARS).chars().count(), 4000);
    }

    #[tokio::test]
    async fn test_claim_returns_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker/jobs/claim"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job": {
                    "id": "job-123",
                    "kind": "SPLIT_SERIES",
                    "rawKey": "raw/source.mp4",
                    "seriesEpisodeDurationSec": 180,
                    "seriesMaxEpisodes": 10
                }
            })))
            .mount(&server)
            .await;

        let job = client_for(&server).claim().await.unwrap().unwrap();
        assert_eq!(job.id.as_str(), "job-123");
        assert_eq!(job.kind, JobKind::SplitSeries);
        assert_eq!(job.series_episode_duration_sec, Some(180));
    }

    #[tokio::test]
    async fn test_claim_empty_queue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker/jobs/claim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job": null})))
            .mount(&server)
            .await;

        assert!(client_for(&server).claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_payload_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker/jobs/job-1/progress"))
            .and(body_json(serde_json::json!({
                "progressPct": 42,
                "stage": "encoding"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let job_id = JobId::from_string("job-1".to_string());
        client_for(&server)
            .progress(&job_id, 42, "encoding", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fail_truncates_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker/jobs/job-1/fail"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let job_id = JobId::from_string("job-1".to_string());
        let huge = "x".repeat(10_000);
        client_for(&server).fail(&job_id, &huge).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["error"].as_str().unwrap().len(), MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn test_non_success_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker/jobs/claim"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let err = client_for(&server).claim().await.unwrap_err();
        match err {
            QueueError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
