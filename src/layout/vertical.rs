use crate::geometry::{BoxPx, Point, floor_div};
use crate::reading::{AnnotationUnit, anchor_units};

use super::{AnnotationPlacement, FontSizes, GlyphPlacement, JobLayout, Orientation, TextMeasure};

/// Spreads `text` down the column so the first and last glyph span the box height.
///
/// Spacing goes negative when the glyphs are taller than the box; the glyphs
/// then overlap rather than spill past the box. Ruby sits right of its first
/// base glyph, lifted by half a ruby line.
pub fn layout_vertical(
    bbox: &BoxPx,
    text: &str,
    fonts: FontSizes,
    units: &[AnnotationUnit],
    measure: &dyn TextMeasure,
) -> JobLayout {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len() as i32;
    let size = fonts.base;
    let box_height = bbox.height();

    let spacing = if n > 1 {
        floor_div(box_height - n * size, n - 1)
    } else {
        0
    };
    let total_height = n * size + (n - 1).max(0) * spacing;
    let top = bbox.y_min + floor_div(box_height - total_height, 2);
    let x = bbox.x_min + floor_div(bbox.width() - size, 2);
    let step = size + spacing;

    let glyphs: Vec<GlyphPlacement> = chars
        .iter()
        .enumerate()
        .map(|(idx, ch)| GlyphPlacement {
            text: ch.to_string(),
            position: Point::new(x, top + idx as i32 * step),
        })
        .collect();

    let lift = floor_div(measure.line_height(fonts.ruby), 2);
    let annotations = anchor_units(units)
        .into_iter()
        .filter(|(anchor, unit)| *anchor < glyphs.len() && unit.needs_ruby())
        .map(|(anchor, unit)| AnnotationPlacement {
            reading: unit.reading.clone(),
            position: Point::new(x + size, glyphs[anchor].position.y - lift),
            anchor_char_index: anchor,
        })
        .collect();

    JobLayout {
        orientation: Orientation::Vertical,
        fonts,
        glyphs,
        annotations,
    }
}
