use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::FontScale;
use crate::services::OcrEngineKind;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub text_color: String,
    pub fill_color: String,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub fallback_families: Vec<String>,
    pub font_scale: FontScale,
    pub erase_padding: i32,
    pub ocr_engine: OcrEngineKind,
    pub ocr_languages: String,
    pub ocr_language_hints: Vec<String>,
    pub ocr_timeout_secs: u64,
    pub detector_command: Option<String>,
    pub detector_args: Vec<String>,
    pub detector_timeout_secs: u64,
    pub dictionary_path: Option<String>,
    pub instruction_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
            font_path: None,
            font_family: None,
            fallback_families: Vec::new(),
            font_scale: FontScale::default(),
            erase_padding: 5,
            ocr_engine: OcrEngineKind::Vision,
            ocr_languages: "jpn".to_string(),
            ocr_language_hints: Vec::new(),
            ocr_timeout_secs: 60,
            detector_command: None,
            detector_args: Vec::new(),
            detector_timeout_secs: 60,
            dictionary_path: None,
            instruction_model: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    render: Option<RenderSettings>,
    ocr: Option<OcrSettings>,
    detector: Option<DetectorSettings>,
    readings: Option<ReadingSettings>,
    instructions: Option<InstructionSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    text_color: Option<String>,
    fill_color: Option<String>,
    font_path: Option<String>,
    font_family: Option<String>,
    fallback_families: Option<Vec<String>>,
    base_font_ratio: Option<f64>,
    ruby_font_ratio: Option<f64>,
    erase_padding: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    engine: Option<String>,
    languages: Option<String>,
    language_hints: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorSettings {
    command: Option<String>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadingSettings {
    dictionary_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InstructionSettings {
    model: Option<String>,
}

/// Embedded defaults, then `./settings.toml`, `./settings.local.toml`, the
/// same pair under `~/.balloon-edit-rust/`, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }
    load_layered(&ordered_paths)
}

fn load_layered(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults)?;

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(render) = incoming.render {
            if let Some(color) = non_empty(render.text_color) {
                self.text_color = color;
            }
            if let Some(color) = non_empty(render.fill_color) {
                self.fill_color = color;
            }
            if let Some(path) = non_empty(render.font_path) {
                self.font_path = Some(path);
            }
            if let Some(family) = non_empty(render.font_family) {
                self.font_family = Some(family);
            }
            if let Some(families) = render.fallback_families {
                self.fallback_families = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
            }
            if let Some(ratio) = render.base_font_ratio {
                self.font_scale.base_ratio = positive_ratio("base_font_ratio", ratio)?;
            }
            if let Some(ratio) = render.ruby_font_ratio {
                self.font_scale.ruby_ratio = positive_ratio("ruby_font_ratio", ratio)?;
            }
            if let Some(padding) = render.erase_padding {
                if padding < 0 {
                    return Err(anyhow!("erase_padding must not be negative (got {})", padding));
                }
                self.erase_padding = padding;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(engine) = non_empty(ocr.engine) {
                self.ocr_engine = OcrEngineKind::parse(&engine)
                    .ok_or_else(|| anyhow!("unknown ocr engine '{}'", engine))?;
            }
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr_languages = languages;
            }
            if let Some(hints) = ocr.language_hints {
                self.ocr_language_hints = hints
                    .into_iter()
                    .filter(|hint| !hint.trim().is_empty())
                    .collect();
            }
            if let Some(timeout) = ocr.timeout_secs
                && timeout > 0
            {
                self.ocr_timeout_secs = timeout;
            }
        }
        if let Some(detector) = incoming.detector {
            if let Some(command) = non_empty(detector.command) {
                self.detector_command = Some(command);
            }
            if let Some(args) = detector.args {
                self.detector_args = args;
            }
            if let Some(timeout) = detector.timeout_secs
                && timeout > 0
            {
                self.detector_timeout_secs = timeout;
            }
        }
        if let Some(readings) = incoming.readings
            && let Some(path) = non_empty(readings.dictionary_path)
        {
            self.dictionary_path = Some(path);
        }
        if let Some(instructions) = incoming.instructions
            && let Some(model) = non_empty(instructions.model)
        {
            self.instruction_model = Some(model);
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn positive_ratio(name: &str, ratio: f64) -> Result<f64> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(ratio)
    } else {
        Err(anyhow!("{} must be a positive number (got {})", name, ratio))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".balloon-edit-rust"))
        }
    })
}
