mod detector;
mod tesseract;
mod vision;

use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::geometry::BoxPx;
use crate::matcher::DetectedRegion;

/// Default limit for external commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

pub use detector::{CommandDetector, DetectorImpl, NoDetector, parse_detector_output};
pub use tesseract::{TesseractOcr, parse_tsv_regions};
pub use vision::{VisionOcr, parse_vision_response};

/// Text found by OCR.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    /// Document-level text, informational only.
    pub full_text: Option<String>,
    pub regions: Vec<DetectedRegion>,
}

pub type DetectorFuture = Pin<Box<dyn Future<Output = Result<Vec<BoxPx>>> + Send>>;

/// Locates ruby (furigana) boxes. Returns boxes only.
pub trait AnnotationDetector {
    fn detect(&self, image_path: &Path) -> DetectorFuture;
}

pub type OcrFuture = Pin<Box<dyn Future<Output = Result<OcrOutput>> + Send>>;

pub trait OcrClient {
    fn detect_text(&self, image_bytes: Arc<Vec<u8>>) -> OcrFuture;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrEngineKind {
    Vision,
    Tesseract,
}

impl OcrEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngineKind::Vision => "vision",
            OcrEngineKind::Tesseract => "tesseract",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "vision" | "google" | "gcv" => Some(OcrEngineKind::Vision),
            "tesseract" => Some(OcrEngineKind::Tesseract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OcrImpl {
    Vision(VisionOcr),
    Tesseract(TesseractOcr),
}

impl OcrClient for OcrImpl {
    fn detect_text(&self, image_bytes: Arc<Vec<u8>>) -> OcrFuture {
        match self {
            OcrImpl::Vision(client) => client.detect_text(image_bytes),
            OcrImpl::Tesseract(client) => client.detect_text(image_bytes),
        }
    }
}

/// Runs `command` to completion; the child is killed if `timeout` expires first.
pub(crate) async fn run_command(
    mut command: Command,
    name: &str,
    timeout: Duration,
) -> Result<Output> {
    command.stdin(Stdio::null()).kill_on_drop(true);
    tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", name, timeout))?
        .with_context(|| format!("failed to run {}", name))
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
