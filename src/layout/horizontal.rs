use crate::geometry::{BoxPx, Point};
use crate::reading::{AnnotationUnit, anchor_units};

use super::{AnnotationPlacement, FontSizes, GlyphPlacement, JobLayout, Orientation, TextMeasure};

/// Sets `text` as one run from the box's top-left corner with a ruby row one
/// ruby line above it.
///
/// The ruby cursor advances by the base-font width of each unit's own base
/// text, so every reading starts over the glyph it annotates.
pub fn layout_horizontal(
    bbox: &BoxPx,
    text: &str,
    fonts: FontSizes,
    units: &[AnnotationUnit],
    measure: &dyn TextMeasure,
) -> JobLayout {
    let mut glyphs = Vec::new();
    let mut cursor = bbox.x_min;
    for ch in text.chars() {
        let glyph = ch.to_string();
        let advance = measure.text_width(&glyph, fonts.base);
        glyphs.push(GlyphPlacement {
            text: glyph,
            position: Point::new(cursor, bbox.y_min),
        });
        cursor += advance;
    }

    let mut annotations = Vec::new();
    let ruby_y = bbox.y_min - fonts.ruby;
    let mut ruby_x = bbox.x_min;
    for (anchor, unit) in anchor_units(units) {
        if unit.needs_ruby() {
            annotations.push(AnnotationPlacement {
                reading: unit.reading.clone(),
                position: Point::new(ruby_x, ruby_y),
                anchor_char_index: anchor,
            });
        }
        ruby_x += measure.text_width(&unit.original_unit, fonts.base);
    }

    JobLayout {
        orientation: Orientation::Horizontal,
        fonts,
        glyphs,
        annotations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FixedMeasure;

    const FONTS: FontSizes = FontSizes { base: 16, ruby: 6 };

    #[test]
    fn run_starts_at_box_corner_and_advances_by_width() {
        let bbox = BoxPx::new(30, 50, 130, 70);
        let layout = layout_horizontal(&bbox, "私の猫", FONTS, &[], &FixedMeasure);
        let xs: Vec<i32> = layout.glyphs.iter().map(|g| g.position.x).collect();
        assert_eq!(xs, vec![30, 46, 62]);
        assert!(layout.glyphs.iter().all(|g| g.position.y == 50));
    }

    #[test]
    fn ruby_row_sits_one_ruby_line_above_its_base_glyphs() {
        let bbox = BoxPx::new(30, 50, 130, 70);
        let units = vec![
            AnnotationUnit::new("私", "わたし"),
            AnnotationUnit::new("の", "の"),
            AnnotationUnit::new("勝利", "しょうり"),
        ];
        let layout = layout_horizontal(&bbox, "私の勝利", FONTS, &units, &FixedMeasure);

        assert_eq!(layout.annotations.len(), 2);
        for annotation in &layout.annotations {
            let glyph = &layout.glyphs[annotation.anchor_char_index];
            assert_eq!(annotation.position.x, glyph.position.x);
            assert_eq!(annotation.position.y, 50 - 6);
            assert!(annotation.position.y + FONTS.ruby <= glyph.position.y);
        }
        assert_eq!(layout.annotations[1].anchor_char_index, 2);
        assert_eq!(layout.annotations[1].reading, "しょうり");
    }

    #[test]
    fn missing_readings_leave_base_run_intact() {
        let bbox = BoxPx::new(0, 10, 100, 30);
        let layout = layout_horizontal(&bbox, "敗北", FONTS, &[], &FixedMeasure);
        assert_eq!(layout.glyphs.len(), 2);
        assert!(layout.annotations.is_empty());
    }
}
