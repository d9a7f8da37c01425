use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::layout::TextMeasure;

const DEFAULT_FAMILY: &str = "sans-serif";
const DEFAULT_ASCENT_RATIO: f32 = 0.88;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn scale(&self, font_size: i32) -> f32 {
        font_size as f32 / self.units_per_em.max(1) as f32
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

#[derive(Clone)]
pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Font used for drawing and measuring; `Default` when nothing could be loaded.
#[derive(Clone)]
pub enum FontHandle {
    Loaded(ResolvedFont),
    Default,
}

impl FontHandle {
    /// Tries the font file, then the family, then each fallback family.
    /// Any failure yields [`FontHandle::Default`].
    pub fn load(font_path: Option<&Path>, font_family: Option<&str>, fallback: &[String]) -> Self {
        match resolve_font(font_path, font_family, fallback) {
            Ok(resolved) => {
                debug!("using font family '{}'", resolved.family);
                FontHandle::Loaded(resolved)
            }
            Err(err) => {
                warn!("font unavailable, using default font: {:#}", err);
                FontHandle::Default
            }
        }
    }

    pub fn family(&self) -> &str {
        match self {
            FontHandle::Loaded(resolved) => resolved.family.as_str(),
            FontHandle::Default => DEFAULT_FAMILY,
        }
    }

    pub fn font_data(&self) -> Option<&[u8]> {
        match self {
            FontHandle::Loaded(resolved) => Some(resolved.metrics.data()),
            FontHandle::Default => None,
        }
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascent(&self, font_size: i32) -> i32 {
        match self {
            FontHandle::Loaded(resolved) => {
                let metrics = &resolved.metrics;
                (metrics.ascender as f32 * metrics.scale(font_size)).round() as i32
            }
            FontHandle::Default => (font_size as f32 * DEFAULT_ASCENT_RATIO).round() as i32,
        }
    }
}

impl TextMeasure for FontHandle {
    fn text_width(&self, text: &str, font_size: i32) -> i32 {
        let font = match self {
            FontHandle::Loaded(resolved) => Some(&resolved.metrics),
            FontHandle::Default => None,
        };
        measure_text_width_px(text, font_size as f32, font).round() as i32
    }

    fn line_height(&self, font_size: i32) -> i32 {
        match self {
            FontHandle::Loaded(resolved) => {
                let metrics = &resolved.metrics;
                let units = metrics.ascender as i32 - metrics.descender as i32;
                (units as f32 * metrics.scale(font_size)).round() as i32
            }
            FontHandle::Default => font_size,
        }
    }
}

fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[String],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| DEFAULT_FAMILY.to_string());
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let candidates = font_family
        .into_iter()
        .chain(fallback.iter().map(String::as_str));
    for candidate in candidates {
        match load_font_metrics_from_family(&db, candidate) {
            Ok(resolved) => return Ok(resolved),
            Err(err) => debug!("font candidate '{}' rejected: {:#}", candidate, err),
        }
    }

    Err(anyhow!("no usable fonts found"))
}

pub(crate) fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        if let Ok(face) = Face::parse(&font.data, font.face_index) {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                if ch == ' ' {
                    advance = advance.saturating_add(font.space_advance as u32);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(font.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                } else {
                    advance = advance.saturating_add(font.space_advance as u32);
                }
            }
            let units = font.units_per_em.max(1) as f32;
            return advance as f32 * (font_size / units);
        }
    }
    estimate_text_width_units(text) * font_size
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn load_font_metrics_from_data(
    data: &[u8],
    preferred_family: Option<&str>,
    preferred_index: Option<u32>,
) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
        let family = extract_family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let metrics = FontMetrics {
            data: Arc::new(data.to_vec()),
            units_per_em,
            space_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            family: family.clone(),
            face_index: index,
        };
        if preferred_index == Some(index) {
            return Ok(metrics);
        }
        if let (Some(preferred), Some(found)) = (preferred_family, &family) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(metrics);
            }
        }
        if fallback.is_none() {
            fallback = Some(metrics);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let families = if family.eq_ignore_ascii_case(DEFAULT_FAMILY) {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = load_font_metrics_from_data(&data, Some(family), Some(face_index))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedFont {
        metrics,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_font_file_falls_back_to_default() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("missing.ttc");
        let handle = FontHandle::load(Some(&missing), None, &[]);
        assert!(matches!(handle, FontHandle::Default));
        assert_eq!(handle.family(), "sans-serif");
        assert!(handle.font_data().is_none());
    }

    #[test]
    fn garbage_font_file_falls_back_to_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write font");
        let handle = FontHandle::load(Some(&path), Some("Broken"), &[]);
        assert!(matches!(handle, FontHandle::Default));
    }

    #[test]
    fn default_font_estimates_full_width_for_cjk() {
        let handle = FontHandle::Default;
        assert_eq!(handle.text_width("猫", 40), 40);
        assert_eq!(handle.text_width("私の", 20), 40);
        assert_eq!(handle.line_height(30), 30);
        assert_eq!(handle.ascent(100), 88);
    }
}
