use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{AnnotationUnit, ReadingConverter, is_ideograph};

const BUILTIN_READINGS_TOML: &str = include_str!("readings.toml");

#[derive(Debug, Deserialize)]
struct ReadingsFile {
    #[serde(default)]
    readings: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Kanji,
    Hiragana,
    Katakana,
    Other,
}

impl Script {
    fn of(ch: char) -> Self {
        if is_ideograph(ch) {
            return Script::Kanji;
        }
        match ch as u32 {
            0x3041..=0x309F => Script::Hiragana,
            0x30A0..=0x30FF | 0x31F0..=0x31FF => Script::Katakana,
            _ => Script::Other,
        }
    }
}

/// Kanji reading converter with dictionary overrides.
///
/// Kanji are resolved by longest match against the dictionary (keys may carry
/// okurigana). Kanji runs with no entry are read through kakasi, using the
/// hiragana that follows as okurigana context; a run kakasi cannot read keeps
/// itself as its reading. Katakana runs read as hiragana, everything else
/// reads as itself.
#[derive(Debug, Clone, Default)]
pub struct DictionaryReadings {
    entries: HashMap<String, String>,
    longest: usize,
}

impl DictionaryReadings {
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_READINGS_TOML).with_context(|| "failed to parse built-in readings")
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: ReadingsFile = toml::from_str(content)?;
        let mut dictionary = Self::default();
        dictionary.extend(parsed.readings);
        Ok(dictionary)
    }

    /// Adds entries from a TOML file with a `[readings]` table; later entries win.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read readings: {}", path.display()))?;
        let parsed: ReadingsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse readings: {}", path.display()))?;
        self.extend(parsed.readings);
        Ok(())
    }

    pub fn extend(&mut self, entries: HashMap<String, String>) {
        for (key, value) in entries {
            let key = key.trim().to_string();
            if key.is_empty() {
                continue;
            }
            self.longest = self.longest.max(key.chars().count());
            self.entries.insert(key, value.trim().to_string());
        }
    }

    fn longest_match(&self, rest: &[char]) -> Option<(usize, &str)> {
        let max = self.longest.min(rest.len());
        (1..=max).rev().find_map(|len| {
            let key: String = rest[..len].iter().collect();
            self.entries.get(&key).map(|reading| (len, reading.as_str()))
        })
    }
}

impl ReadingConverter for DictionaryReadings {
    fn convert(&self, text: &str) -> Result<Vec<AnnotationUnit>> {
        let chars: Vec<char> = text.chars().collect();
        let mut units = Vec::new();
        let mut idx = 0usize;
        while idx < chars.len() {
            let script = Script::of(chars[idx]);
            if script == Script::Kanji {
                if let Some((len, reading)) = self.longest_match(&chars[idx..]) {
                    let original: String = chars[idx..idx + len].iter().collect();
                    units.push(AnnotationUnit::new(original, reading));
                    idx += len;
                } else {
                    let start = idx;
                    while idx < chars.len()
                        && Script::of(chars[idx]) == Script::Kanji
                        && (idx == start || self.longest_match(&chars[idx..]).is_none())
                    {
                        idx += 1;
                    }
                    let run: String = chars[start..idx].iter().collect();
                    let okurigana: String = chars[idx..]
                        .iter()
                        .take_while(|ch| Script::of(**ch) == Script::Hiragana)
                        .collect();
                    let reading = kanji_reading(&run, &okurigana).unwrap_or_else(|| run.clone());
                    units.push(AnnotationUnit::new(run, reading));
                }
                continue;
            }

            let start = idx;
            while idx < chars.len() && Script::of(chars[idx]) == script {
                idx += 1;
            }
            let original: String = chars[start..idx].iter().collect();
            let reading = if script == Script::Katakana {
                katakana_to_hiragana(&original)
            } else {
                original.clone()
            };
            units.push(AnnotationUnit::new(original, reading));
        }
        Ok(units)
    }
}

fn kanji_reading(run: &str, okurigana: &str) -> Option<String> {
    if !okurigana.is_empty() {
        let converted = kakasi::convert(&format!("{}{}", run, okurigana)).hiragana;
        if let Some(reading) = strip_okurigana(&converted, okurigana) {
            return Some(reading.to_string());
        }
    }
    let converted = kakasi::convert(run).hiragana;
    is_kana_reading(&converted).then_some(converted)
}

/// The reading of the kanji alone, if `converted` still ends in `okurigana`.
fn strip_okurigana<'a>(converted: &'a str, okurigana: &str) -> Option<&'a str> {
    converted
        .strip_suffix(okurigana)
        .filter(|reading| is_kana_reading(reading))
}

fn is_kana_reading(text: &str) -> bool {
    !text.is_empty() && !text.chars().any(is_ideograph)
}

fn katakana_to_hiragana(text: &str) -> String {
    text.chars()
        .map(|ch| match ch as u32 {
            code @ 0x30A1..=0x30F6 => char::from_u32(code - 0x60).unwrap_or(ch),
            _ => ch,
        })
        .collect()
}
