//! Client for the remote emotion-detection service.
//!
//! One multipart POST per capture, no retries. A failed call surfaces
//! immediately to the controller.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::DetectError;
use crate::frame::ImageBuffer;

const DETECT_PATH: &str = "/detect_emotion";
const IMAGE_FIELD: &str = "image";
const IMAGE_FILENAME: &str = "capture.jpg";
const IMAGE_MIME: &str = "image/jpeg";

/// Maximum error-body excerpt carried in a Network error
const MAX_ERROR_BODY: usize = 200;

/// Response envelope from the detection service
#[derive(Debug, Clone, Deserialize)]
pub struct DetectEnvelope {
    pub emotions: EmotionsField,
}

/// The `emotions` field as returned by the service.
///
/// A well-behaved response carries a list; anything else is kept around so
/// the interpreter can take its invalid-format branch instead of the
/// transport failing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmotionsField {
    List(Vec<RawEmotion>),
    Other(serde_json::Value),
}

/// One element of the `emotions` list.
///
/// The service mixes bare label strings with per-face records carrying an
/// `emotion` field (plus a bounding box we ignore). Anything that fits
/// neither shape is unusable and gets dropped during interpretation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawEmotion {
    Labeled { emotion: String },
    Bare(String),
    Unusable(serde_json::Value),
}

impl RawEmotion {
    /// The usable label, if any. Empty labels count as unusable.
    pub fn label(&self) -> Option<&str> {
        let label = match self {
            RawEmotion::Labeled { emotion } => emotion.as_str(),
            RawEmotion::Bare(label) => label.as_str(),
            RawEmotion::Unusable(_) => return None,
        };
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }
}

/// Truncate an error body for reporting, backing off to a char boundary so
/// multibyte bodies cannot split mid-character.
fn error_excerpt(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Submits captured stills for emotion detection
#[async_trait]
pub trait Detector: Send + Sync {
    async fn submit(&self, image: ImageBuffer) -> Result<DetectEnvelope, DetectError>;
}

/// HTTP client for the detection endpoint
pub struct DetectionClient {
    client: reqwest::Client,
    base_url: String,
}

impl DetectionClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Detector for DetectionClient {
    async fn submit(&self, image: ImageBuffer) -> Result<DetectEnvelope, DetectError> {
        let url = format!("{}{}", self.base_url, DETECT_PATH);

        debug!(
            "Submitting {}x{} capture ({} bytes) to {}",
            image.width,
            image.height,
            image.data.len(),
            url
        );

        let part = reqwest::multipart::Part::bytes(image.data)
            .file_name(IMAGE_FILENAME)
            .mime_str(IMAGE_MIME)
            .map_err(|e| DetectError::Network(format!("failed to build image part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::Network(format!(
                "detection service returned {}: {}",
                status,
                error_excerpt(&body)
            )));
        }

        response
            .json::<DetectEnvelope>()
            .await
            .map_err(|e| DetectError::Protocol(e.to_string()))
    }
}
