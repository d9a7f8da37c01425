mod horizontal;
mod vertical;

use serde::Serialize;

use crate::geometry::{BoxPx, Point};
use crate::matcher::PlacementJob;
use crate::reading::AnnotationUnit;

pub use horizontal::layout_horizontal;
pub use vertical::layout_vertical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        }
    }
}

/// Taller-than-wide boxes are columns; squares are rows.
pub fn orientation(bbox: &BoxPx) -> Orientation {
    if bbox.height() > bbox.width() {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    }
}

/// Font sizes as fractions of the region height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontScale {
    pub base_ratio: f64,
    pub ruby_ratio: f64,
}

impl Default for FontScale {
    fn default() -> Self {
        Self {
            base_ratio: 0.8,
            ruby_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontSizes {
    pub base: i32,
    pub ruby: i32,
}

pub fn font_size(bbox: &BoxPx, scale: &FontScale) -> FontSizes {
    let height = bbox.height() as f64;
    FontSizes {
        base: ((height * scale.base_ratio).floor() as i32).max(1),
        ruby: ((height * scale.ruby_ratio).floor() as i32).max(1),
    }
}

/// Glyph metrics needed by the layout engines.
pub trait TextMeasure {
    /// Advance width of `text` set as one run.
    fn text_width(&self, text: &str, font_size: i32) -> i32;
    /// Height of one line of text.
    fn line_height(&self, font_size: i32) -> i32;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlyphPlacement {
    pub text: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationPlacement {
    pub reading: String,
    pub position: Point,
    pub anchor_char_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobLayout {
    pub orientation: Orientation,
    pub fonts: FontSizes,
    pub glyphs: Vec<GlyphPlacement>,
    pub annotations: Vec<AnnotationPlacement>,
}

/// Routes a job to the engine for its orientation.
pub fn layout_job(
    job: &PlacementJob<'_>,
    units: &[AnnotationUnit],
    scale: &FontScale,
    measure: &dyn TextMeasure,
) -> JobLayout {
    let bbox = &job.region.bbox;
    let fonts = font_size(bbox, scale);
    match job.orientation {
        Orientation::Vertical => layout_vertical(bbox, &job.pair.to, fonts, units, measure),
        Orientation::Horizontal => layout_horizontal(bbox, &job.pair.to, fonts, units, measure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{DetectedRegion, ReplacementPair};
    use crate::test_util::FixedMeasure;

    #[test]
    fn orientation_ties_are_horizontal() {
        assert_eq!(orientation(&BoxPx::new(0, 0, 10, 100)), Orientation::Vertical);
        assert_eq!(orientation(&BoxPx::new(0, 0, 100, 10)), Orientation::Horizontal);
        assert_eq!(orientation(&BoxPx::new(0, 0, 50, 50)), Orientation::Horizontal);
        assert_eq!(orientation(&BoxPx::new(3, 3, 3, 3)), Orientation::Horizontal);
    }

    #[test]
    fn font_sizes_follow_region_height() {
        let fonts = font_size(&BoxPx::new(0, 0, 10, 100), &FontScale::default());
        assert_eq!(fonts, FontSizes { base: 80, ruby: 30 });
    }

    #[test]
    fn font_sizes_never_collapse_to_zero() {
        let fonts = font_size(&BoxPx::new(0, 0, 10, 1), &FontScale::default());
        assert_eq!(fonts, FontSizes { base: 1, ruby: 1 });
    }

    #[test]
    fn jobs_are_routed_by_orientation() {
        let pair = ReplacementPair::new("犬", "猫");
        let column = DetectedRegion::new(BoxPx::new(0, 0, 20, 60), "犬");
        let row = DetectedRegion::new(BoxPx::new(0, 0, 60, 20), "犬");
        let measure = FixedMeasure;

        for (region, expected) in [
            (&column, Orientation::Vertical),
            (&row, Orientation::Horizontal),
        ] {
            let job = PlacementJob {
                region,
                pair: &pair,
                orientation: orientation(&region.bbox),
            };
            let layout = layout_job(&job, &[], &FontScale::default(), &measure);
            assert_eq!(layout.orientation, expected);
            assert_eq!(layout.glyphs.len(), 1);
            assert!(layout.annotations.is_empty());
        }
    }
}
