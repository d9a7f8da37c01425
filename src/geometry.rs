use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixel coordinates.
///
/// `x_min <= x_max` and `y_min <= y_max` always hold; constructors swap
/// reversed corners instead of rejecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[i32; 4]")]
pub struct BoxPx {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BoxPx {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    /// Reduces a polygon to the box spanning its vertices.
    pub fn from_vertices<I>(vertices: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut iter = vertices.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        };
        for (x, y) in iter {
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> i32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> i32 {
        self.y_max.saturating_sub(self.y_min)
    }

    pub fn padded(&self, padding: i32) -> Self {
        Self::new(
            self.x_min.saturating_sub(padding),
            self.y_min.saturating_sub(padding),
            self.x_max.saturating_add(padding),
            self.y_max.saturating_add(padding),
        )
    }
}

impl From<[i32; 4]> for BoxPx {
    fn from(value: [i32; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

/// Coordinates from external JSON are clamped to this magnitude.
const MAX_COORD: f64 = 1_048_576.0;

fn clamp_coord(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(-MAX_COORD, MAX_COORD) as i32
}

impl From<[f64; 4]> for BoxPx {
    fn from(value: [f64; 4]) -> Self {
        Self::new(
            clamp_coord(value[0]),
            clamp_coord(value[1]),
            clamp_coord(value[2]),
            clamp_coord(value[3]),
        )
    }
}

impl From<BoxPx> for [i32; 4] {
    fn from(value: BoxPx) -> Self {
        [value.x_min, value.y_min, value.x_max, value.y_max]
    }
}

/// Top-left anchor of a drawn run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Floor division, matching how pixel offsets are rounded everywhere in layout.
pub(crate) fn floor_div(value: i32, divisor: i32) -> i32 {
    value.div_euclid(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_reduces_to_spanning_box() {
        let bbox = BoxPx::from_vertices([(12, 40), (30, 38), (31, 90), (10, 92)]).unwrap();
        assert_eq!(bbox, BoxPx::new(10, 38, 31, 92));
        assert_eq!(bbox.width(), 21);
        assert_eq!(bbox.height(), 54);
    }

    #[test]
    fn empty_polygon_has_no_box() {
        assert!(BoxPx::from_vertices(Vec::new()).is_none());
    }

    #[test]
    fn reversed_corners_are_normalized() {
        let bbox = BoxPx::new(20, 30, 5, 10);
        assert_eq!(bbox, BoxPx::new(5, 10, 20, 30));
        assert!(bbox.x_min <= bbox.x_max && bbox.y_min <= bbox.y_max);
    }

    #[test]
    fn padding_grows_every_side() {
        let bbox = BoxPx::new(10, 10, 20, 40).padded(5);
        assert_eq!(bbox, BoxPx::new(5, 5, 25, 45));
    }

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-60, 1), -60);
        assert_eq!(floor_div(-7, 2), -4);
    }

    #[test]
    fn box_deserializes_from_corner_list() {
        let bbox: BoxPx = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(bbox, BoxPx::new(1, 2, 3, 4));
        let bbox: BoxPx = serde_json::from_str("[1.4, 2.6, 30.5, 4.0]").unwrap();
        assert_eq!(bbox, BoxPx::new(1, 3, 31, 4));
    }

    #[test]
    fn huge_coordinates_are_clamped_before_measuring() {
        let bbox: BoxPx = serde_json::from_str("[-1e12, 0, 1e12, 1]").unwrap();
        assert_eq!(bbox.x_min, -1_048_576);
        assert_eq!(bbox.x_max, 1_048_576);
        assert_eq!(bbox.width(), 2_097_152);
        assert_eq!(bbox.height(), 1);

        let extreme = BoxPx::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(extreme.width(), i32::MAX);
        assert_eq!(extreme.padded(5), extreme);
    }
}
