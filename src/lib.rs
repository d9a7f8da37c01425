use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::time::Duration;

pub mod canvas;
pub mod editor;
pub mod eraser;
pub mod error;
pub mod geometry;
pub mod instructions;
pub mod layout;
pub mod logging;
pub mod matcher;
pub mod plan;
mod providers;
pub mod reading;
pub mod services;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use editor::{EditOutcome, Editor};
pub use error::{EditError, ExternalService};
pub use matcher::ReplacementPair;
pub use plan::{EditPlan, EditReport, PlanOptions, plan_edit};
pub use providers::{
    OpenAI, Provider, ProviderFuture, ProviderReply, ProviderResponse, ProviderUsage, ToolSpec,
};

use canvas::{CanvasStyle, FontHandle};
use reading::DictionaryReadings;
use services::{
    CommandDetector, DetectorImpl, NoDetector, OcrEngineKind, OcrImpl, TesseractOcr, VisionOcr,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub image_path: String,
    pub instruction: Option<String>,
    /// Raw `FROM=TO` arguments; when present the instruction is not sent to the model.
    pub replacements: Vec<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub ocr_engine: Option<String>,
    pub detector_command: Option<String>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let image_path = Path::new(config.image_path.trim());
    if image_path.as_os_str().is_empty() {
        return Err(anyhow!("image path is empty"));
    }

    let pairs = if config.replacements.is_empty() {
        let instruction = config
            .instruction
            .clone()
            .or(input)
            .unwrap_or_default();
        let key = providers::resolve_key(config.key.as_deref())
            .with_context(|| "no API key found for the instruction parser")?;
        let model = config
            .model
            .clone()
            .or_else(|| settings.instruction_model.clone())
            .unwrap_or_default();
        let provider = OpenAI::new(key).with_model(model);
        instructions::parse_instruction(provider, &instruction).await?
    } else {
        parse_replacement_args(&config.replacements)?
    };

    let detector = match config
        .detector_command
        .clone()
        .or_else(|| settings.detector_command.clone())
    {
        Some(command) => {
            DetectorImpl::Command(
                CommandDetector::new(command, settings.detector_args.clone())
                    .with_timeout(Duration::from_secs(settings.detector_timeout_secs)),
            )
        }
        None => DetectorImpl::None(NoDetector),
    };

    let engine = match config.ocr_engine.as_deref() {
        Some(value) => OcrEngineKind::parse(value).ok_or_else(|| {
            anyhow!("unknown OCR engine '{}' (expected vision or tesseract)", value)
        })?,
        None => settings.ocr_engine,
    };
    let ocr = match engine {
        OcrEngineKind::Vision => OcrImpl::Vision(
            VisionOcr::from_env()?
                .with_timeout(Duration::from_secs(settings.ocr_timeout_secs))
                .with_language_hints(settings.ocr_language_hints.clone()),
        ),
        OcrEngineKind::Tesseract => {
            OcrImpl::Tesseract(
                TesseractOcr::new(settings.ocr_languages.clone())
                    .with_timeout(Duration::from_secs(settings.ocr_timeout_secs)),
            )
        }
    };

    let mut readings = DictionaryReadings::builtin()?;
    if let Some(path) = settings.dictionary_path.as_deref() {
        readings.merge_file(Path::new(path))?;
    }

    let font = FontHandle::load(
        settings.font_path.as_deref().map(Path::new),
        settings.font_family.as_deref(),
        &settings.fallback_families,
    );
    let editor = Editor::new(detector, ocr, readings, font)
        .with_style(CanvasStyle {
            text_color: settings.text_color.clone(),
            fill_color: settings.fill_color.clone(),
        })
        .with_options(PlanOptions {
            scale: settings.font_scale,
            erase_padding: settings.erase_padding,
        });

    let outcome = editor.edit(image_path, &pairs).await?;
    Ok(format_outcome(&outcome))
}

/// Parses `FROM=TO` arguments, splitting at the first `=`.
pub fn parse_replacement_args(args: &[String]) -> Result<Vec<ReplacementPair>> {
    args.iter()
        .map(|arg| {
            let (from, to) = arg
                .split_once('=')
                .ok_or_else(|| anyhow!("replacement must look like FROM=TO (got '{}')", arg))?;
            if from.is_empty() {
                return Err(anyhow!("replacement source is empty in '{}'", arg));
            }
            Ok(ReplacementPair::new(from, to))
        })
        .collect()
}

fn format_outcome(outcome: &EditOutcome) -> String {
    let report = &outcome.report;
    let mut lines = vec![outcome.output_path.display().to_string()];
    if report.regions == 0 {
        lines.push("no text detected".to_string());
    }
    lines.push(format!("replaced: {}", report.jobs.len()));
    for job in &report.jobs {
        lines.push(format!(
            "  {} -> {} in \"{}\" ({}, ruby {})",
            job.from,
            job.to,
            job.region_text,
            job.orientation.as_str(),
            job.ruby
        ));
    }
    if !report.not_found.is_empty() {
        lines.push(format!("not found: {}", report.not_found.join(", ")));
    }
    if !report.rejected.is_empty() {
        lines.push(format!(
            "rejected (empty source): {}",
            report.rejected.join(", ")
        ));
    }
    if !report.annotation_failures.is_empty() {
        lines.push(format!(
            "without ruby: {}",
            report.annotation_failures.join(", ")
        ));
    }
    lines.join("\n")
}
