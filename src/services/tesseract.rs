use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::{DEFAULT_COMMAND_TIMEOUT, OcrClient, OcrFuture, OcrOutput, run_command};
use crate::geometry::BoxPx;
use crate::matcher::DetectedRegion;

/// Local OCR through the `tesseract` CLI, one region per recognized line.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    languages: String,
    timeout: Duration,
}

/// Sparse text: balloons are scattered over the page.
const PAGE_SEGMENTATION_MODE: u32 = 11;

impl TesseractOcr {
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl OcrClient for TesseractOcr {
    fn detect_text(&self, image_bytes: Arc<Vec<u8>>) -> OcrFuture {
        let ocr = self.clone();
        Box::pin(async move {
            let mut tmp = tempfile::Builder::new()
                .suffix(".img")
                .tempfile()
                .with_context(|| "failed to create temp file for OCR")?;
            tmp.write_all(&image_bytes)
                .with_context(|| "failed to write temp image for OCR")?;
            tmp.flush().ok();
            let tsv = run_tesseract_tsv(tmp.path(), &ocr.languages, ocr.timeout).await?;
            parse_tsv_regions(&tsv)
        })
    }
}

async fn run_tesseract_tsv(path: &Path, languages: &str, timeout: Duration) -> Result<String> {
    let languages = languages.trim();
    if languages.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }
    let mut command = Command::new("tesseract");
    command
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg(PAGE_SEGMENTATION_MODE.to_string())
        .arg("tsv");
    let output = run_command(command, "tesseract", timeout)
        .await
        .with_context(|| "tesseract did not complete (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Groups word rows (level 5) by line and merges each line into one region.
///
/// Lines keep tesseract's reading order. Words are joined without spaces
/// when either side is CJK.
pub fn parse_tsv_regions(tsv: &str) -> Result<OcrOutput> {
    let mut lines: BTreeMap<(i32, i32, i32, i32), Vec<(BoxPx, String)>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let key = (
            cols[1].parse().unwrap_or(0),
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        let left: i32 = cols[6].parse().unwrap_or(0);
        let top: i32 = cols[7].parse().unwrap_or(0);
        let width: i32 = cols[8].parse().unwrap_or(0);
        let height: i32 = cols[9].parse().unwrap_or(0);
        let bbox = BoxPx::new(left, top, left + width, top + height);
        lines.entry(key).or_default().push((bbox, text.to_string()));
    }

    let mut regions = Vec::new();
    for words in lines.into_values() {
        let Some(bbox) = BoxPx::from_vertices(words.iter().flat_map(|(bbox, _)| {
            [(bbox.x_min, bbox.y_min), (bbox.x_max, bbox.y_max)]
        })) else {
            continue;
        };
        let mut text = String::new();
        for (_, word) in &words {
            if needs_space(&text, word) {
                text.push(' ');
            }
            text.push_str(word);
        }
        regions.push(DetectedRegion::new(bbox, text));
    }

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

fn needs_space(current: &str, next: &str) -> bool {
    let Some(last) = current.chars().last() else {
        return false;
    };
    let Some(first) = next.chars().next() else {
        return false;
    };
    !(is_cjk(last) || is_cjk(first))
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3000..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xFF00..=0xFFEF
    )
}
