use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::{OcrClient, OcrFuture, OcrOutput, get_env};
use crate::geometry::BoxPx;
use crate::matcher::DetectedRegion;
use crate::providers::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};

const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Google Cloud Vision `TEXT_DETECTION` over the REST API.
#[derive(Debug, Clone)]
pub struct VisionOcr {
    key: String,
    timeout: Duration,
    language_hints: Vec<String>,
}

impl VisionOcr {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: Duration::from_secs(60),
            language_hints: Vec::new(),
        }
    }

    /// Reads `GOOGLE_VISION_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let key = get_env("GOOGLE_VISION_API_KEY")
            .or_else(|| get_env("GOOGLE_API_KEY"))
            .ok_or_else(|| anyhow!("Vision API key not found (GOOGLE_VISION_API_KEY)"))?;
        Ok(Self::new(key))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }
}

impl OcrClient for VisionOcr {
    fn detect_text(&self, image_bytes: Arc<Vec<u8>>) -> OcrFuture {
        let client = self.clone();
        Box::pin(async move { call_annotate(client, &image_bytes).await })
    }
}

async fn call_annotate(vision: VisionOcr, image_bytes: &[u8]) -> Result<OcrOutput> {
    let client = reqwest::Client::builder()
        .timeout(vision.timeout)
        .build()
        .with_context(|| "failed to build HTTP client")?;

    let mut request = json!({
        "image": {"content": BASE64.encode(image_bytes)},
        "features": [{"type": "TEXT_DETECTION"}]
    });
    if !vision.language_hints.is_empty() {
        request["imageContext"] = json!({"languageHints": vision.language_hints});
    }
    let body = json!({ "requests": [request] });

    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = client
            .post(DEFAULT_ENDPOINT)
            .query(&[("key", vision.key.as_str())])
            .json(&body)
            .send()
            .await
            .with_context(|| "failed to reach Vision API")?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return parse_vision_response(&text);
        }
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff("Vision", attempt, delay, retry_after).await;
            continue;
        }
        return Err(anyhow!(
            "Vision API error ({}): {}",
            status,
            extract_vision_error(&text).unwrap_or(text)
        ));
    }
}

/// The first annotation is the whole-page text; the rest become regions.
pub fn parse_vision_response(text: &str) -> Result<OcrOutput> {
    let payload: AnnotateResponse =
        serde_json::from_str(text).with_context(|| "failed to parse Vision response JSON")?;
    let Some(first) = payload.responses.into_iter().next() else {
        return Ok(OcrOutput::default());
    };
    if let Some(error) = first.error {
        return Err(anyhow!(
            "Vision API error ({}): {}",
            error.code.unwrap_or_default(),
            error.message.unwrap_or_else(|| "unknown error".to_string())
        ));
    }

    let mut annotations = first.text_annotations.into_iter();
    let full_text = annotations.next().map(|annotation| annotation.description);
    let regions = annotations
        .filter_map(|annotation| {
            let bbox = BoxPx::from_vertices(
                annotation
                    .bounding_poly
                    .vertices
                    .iter()
                    .map(|vertex| (vertex.x, vertex.y)),
            )?;
            Some(DetectedRegion::new(bbox, annotation.description))
        })
        .collect();
    Ok(OcrOutput { full_text, regions })
}

fn extract_vision_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<VisionStatus>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error?.message
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    bounding_poly: BoundingPoly,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

/// Vision omits zero-valued coordinates.
#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    code: Option<i32>,
    message: Option<String>,
}
