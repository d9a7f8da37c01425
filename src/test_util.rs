use anyhow::{Result, anyhow};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::geometry::BoxPx;
use crate::layout::TextMeasure;
use crate::matcher::DetectedRegion;
use crate::providers::{Provider, ProviderFuture, ProviderReply, ProviderResponse, ToolSpec};
use crate::reading::{AnnotationUnit, ReadingConverter};
use crate::services::{AnnotationDetector, DetectorFuture, OcrClient, OcrFuture, OcrOutput};

/// Every character is one em wide and lines are one em tall.
pub(crate) struct FixedMeasure;

impl TextMeasure for FixedMeasure {
    fn text_width(&self, text: &str, font_size: i32) -> i32 {
        text.chars().count() as i32 * font_size
    }

    fn line_height(&self, font_size: i32) -> i32 {
        font_size
    }
}

pub(crate) struct FailingReadings;

impl ReadingConverter for FailingReadings {
    fn convert(&self, _text: &str) -> Result<Vec<AnnotationUnit>> {
        Err(anyhow!("reading service unavailable"))
    }
}

pub(crate) enum FakeDetector {
    Boxes(Vec<BoxPx>),
    Fails,
}

impl AnnotationDetector for FakeDetector {
    fn detect(&self, _image_path: &Path) -> DetectorFuture {
        let result = match self {
            FakeDetector::Boxes(boxes) => Ok(boxes.clone()),
            FakeDetector::Fails => Err(anyhow!("detector model missing")),
        };
        Box::pin(async move { result })
    }
}

#[derive(Clone)]
pub(crate) enum FakeOcr {
    Regions(Vec<DetectedRegion>),
    Fails,
}

impl OcrClient for FakeOcr {
    fn detect_text(&self, _image_bytes: Arc<Vec<u8>>) -> OcrFuture {
        let ocr = self.clone();
        Box::pin(async move {
            match ocr {
                FakeOcr::Regions(regions) => {
                    let full_text = if regions.is_empty() {
                        None
                    } else {
                        Some(
                            regions
                                .iter()
                                .map(|region| region.text.as_str())
                                .collect::<Vec<_>>()
                                .join("\n"),
                        )
                    };
                    Ok(OcrOutput { full_text, regions })
                }
                FakeOcr::Fails => Err(anyhow!("Vision API error (403 Forbidden): denied")),
            }
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SeenRequest {
    pub system_inputs: Vec<String>,
    pub user_inputs: Vec<String>,
    pub tool: Option<String>,
}

/// Answers every tool call with a canned reply and records what it was sent.
#[derive(Clone)]
pub(crate) struct FakeProvider {
    reply: ProviderReply,
    seen: Arc<Mutex<SeenRequest>>,
}

impl FakeProvider {
    pub fn with_reply(reply: ProviderReply) -> Self {
        Self {
            reply,
            seen: Arc::new(Mutex::new(SeenRequest::default())),
        }
    }

    pub fn seen(&self) -> SeenRequest {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl Provider for FakeProvider {
    fn append_system_input(self, input: String) -> Self {
        self.seen
            .lock()
            .expect("seen lock")
            .system_inputs
            .push(input);
        self
    }

    fn append_user_input(self, input: String) -> Self {
        self.seen.lock().expect("seen lock").user_inputs.push(input);
        self
    }

    fn register_tool(self, _tool: ToolSpec) -> Self {
        self
    }

    fn call_tool(self, tool_name: &str) -> ProviderFuture {
        self.seen.lock().expect("seen lock").tool = Some(tool_name.to_string());
        let reply = self.reply.clone();
        Box::pin(async move {
            Ok(ProviderResponse {
                reply,
                model: Some("fake-model".to_string()),
                usage: None,
            })
        })
    }
}
