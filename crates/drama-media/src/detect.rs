//! Face-detection capability.
//!
//! Detection is an optional capability behind a trait: an HTTP inference
//! sidecar when one is reachable, a null detector otherwise. The null
//! detector yields no faces, which downstream code treats as "center crop,
//! no face score" rather than an error.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use drama_models::FaceRegion;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
const DETECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A face-detection backend.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a still image. Coordinates are in pixels of the
    /// supplied image.
    async fn detect(&self, image: &Path) -> MediaResult<Vec<FaceRegion>>;

    fn name(&self) -> &'static str;
}

/// Detector backed by an HTTP inference sidecar.
pub struct HttpFaceDetector {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

#[derive(Debug, Deserialize)]
struct DetectedFace {
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
    confidence: f64,
}

impl HttpFaceDetector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Check whether the sidecar answers its health endpoint.
    pub async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(
            self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await,
            Ok(resp) if resp.status().is_success()
        )
    }
}

#[async_trait]
impl FaceDetector for HttpFaceDetector {
    async fn detect(&self, image: &Path) -> MediaResult<Vec<FaceRegion>> {
        let bytes = tokio::fs::read(image).await?;
        let url = format!("{}/detect", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("content-type", "image/jpeg")
            .timeout(DETECT_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .map_err(|e| MediaError::detection_failed(format!("POST {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(MediaError::detection_failed(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| MediaError::detection_failed(format!("bad response from {url}: {e}")))?;

        Ok(parsed
            .faces
            .into_iter()
            .map(|f| FaceRegion {
                center_x: f.center_x,
                center_y: f.center_y,
                width: f.width,
                height: f.height,
                confidence: f.confidence,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Detector that never finds faces.
pub struct NullFaceDetector;

#[async_trait]
impl FaceDetector for NullFaceDetector {
    async fn detect(&self, _image: &Path) -> MediaResult<Vec<FaceRegion>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Pick a detector at startup.
///
/// The sidecar is probed once; later failures of a healthy sidecar are
/// handled per-frame by the crop engine, not by re-selection.
pub async fn select_detector(service_url: Option<&str>) -> Arc<dyn FaceDetector> {
    if let Some(url) = service_url {
        let detector = HttpFaceDetector::new(url);
        if detector.healthy().await {
            info!(url, "Face-detection service available");
            return Arc::new(detector);
        }
        warn!(url, "Face-detection service unreachable, using center crop");
    } else {
        info!("No face-detection service configured, using center crop");
    }
    Arc::new(NullFaceDetector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_null_detector_finds_nothing() {
        let faces = NullFaceDetector.detect(Path::new("frame.jpg")).await.unwrap();
        assert!(faces.is_empty());
        assert_eq!(NullFaceDetector.name(), "null");
    }

    #[tokio::test]
    async fn test_http_detector_parses_faces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "faces": [
                    {"center_x": 640.0, "center_y": 320.0,
                     "width": 120.0, "height": 150.0, "confidence": 0.92}
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.jpg");
        std::fs::write(&frame, b"jpeg-bytes").unwrap();

        let detector = HttpFaceDetector::new(server.uri());
        let faces = detector.detect(&frame).await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].center_x, 640.0);
        assert!((faces[0].confidence - 0.92).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_select_falls_back_without_service() {
        let detector = select_detector(None).await;
        assert_eq!(detector.name(), "null");

        // Unreachable port: probe fails, null fallback.
        let detector = select_detector(Some("http://127.0.0.1:1")).await;
        assert_eq!(detector.name(), "null");
    }

    #[tokio::test]
    async fn test_select_uses_healthy_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let detector = select_detector(Some(&server.uri())).await;
        assert_eq!(detector.name(), "http");
    }
}
