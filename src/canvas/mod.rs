mod font;
mod svg;

use serde::Serialize;
use std::fmt;

use crate::geometry::{BoxPx, Point};

pub use font::{FontHandle, FontMetrics, ResolvedFont, load_font_metrics};
pub use svg::{CanvasStyle, SvgCanvas, edited_path, save_image};

/// A single drawing operation, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Paint the box with the fill colour.
    Erase { bbox: BoxPx },
    Glyph {
        text: String,
        position: Point,
        font_size: i32,
    },
    Ruby {
        text: String,
        position: Point,
        font_size: i32,
        anchor_char_index: usize,
    },
}

impl fmt::Display for DrawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawCommand::Erase { bbox } => write!(
                f,
                "erase ({}, {}) - ({}, {})",
                bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max
            ),
            DrawCommand::Glyph {
                text,
                position,
                font_size,
            } => write!(
                f,
                "glyph {:?} at ({}, {}) size {}",
                text, position.x, position.y, font_size
            ),
            DrawCommand::Ruby {
                text,
                position,
                font_size,
                anchor_char_index,
            } => write!(
                f,
                "ruby {:?} at ({}, {}) size {} over #{}",
                text, position.x, position.y, font_size, anchor_char_index
            ),
        }
    }
}

/// Raster sink owned exclusively by one edit.
pub trait Canvas {
    fn draw(&mut self, command: &DrawCommand);

    fn draw_all(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.draw(command);
        }
    }
}
