use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::{Canvas, DrawCommand, FontHandle};

#[derive(Debug, Clone)]
pub struct CanvasStyle {
    pub text_color: String,
    pub fill_color: String,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
        }
    }
}

/// Collects draw commands as SVG over the source image and rasterizes them with resvg.
pub struct SvgCanvas {
    base: RgbaImage,
    font: FontHandle,
    style: CanvasStyle,
    body: String,
}

impl SvgCanvas {
    pub fn new(base: RgbaImage, font: FontHandle, style: CanvasStyle) -> Self {
        Self {
            base,
            font,
            style,
            body: String::new(),
        }
    }

    pub fn to_svg(&self) -> Result<String> {
        let (width, height) = self.base.dimensions();
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(self.base.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .with_context(|| "failed to encode base image for SVG")?;
        let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&png));

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));
        svg.push_str(&self.body);
        svg.push_str("</svg>");
        Ok(svg)
    }

    pub fn render(self) -> Result<RgbaImage> {
        let svg = self.to_svg()?;
        let (width, height) = self.base.dimensions();

        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(data) = self.font.font_data() {
            db.load_font_data(data.to_vec());
        }
        let options = Options {
            fontdb: Arc::new(db),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse SVG")?;
        let mut pixmap =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("empty canvas {}x{}", width, height))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

        let mut raw = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(width, height, raw)
            .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
    }

    fn push_text(&mut self, text: &str, x: i32, y: i32, font_size: i32) {
        let baseline = y + self.font.ascent(font_size);
        self.body.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}">{text}</text>"#,
            x = x,
            y = baseline,
            size = font_size,
            color = escape_xml(&self.style.text_color),
            family = escape_xml(self.font.family()),
            text = escape_xml(text)
        ));
    }
}

impl Canvas for SvgCanvas {
    fn draw(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::Erase { bbox } => {
                self.body.push_str(&format!(
                    r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
                    x = bbox.x_min,
                    y = bbox.y_min,
                    w = bbox.width() + 1,
                    h = bbox.height() + 1,
                    fill = escape_xml(&self.style.fill_color)
                ));
            }
            DrawCommand::Glyph {
                text,
                position,
                font_size,
            }
            | DrawCommand::Ruby {
                text,
                position,
                font_size,
                ..
            } => self.push_text(text, position.x, position.y, *font_size),
        }
    }
}

/// `page.png` becomes `page_edited.png`; extensionless paths get `.png`.
pub fn edited_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let ext = path
        .extension()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());
    path.with_file_name(format!("{}_edited.{}", stem, ext))
}

/// Writes `image` in the format implied by the extension of `path`.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported image extension: {}", path.display()))?;
    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let dynamic = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(dynamic.to_rgb8()),
        _ => dynamic,
    };
    dynamic
        .save_with_format(path, format)
        .with_context(|| format!("failed to write image: {}", path.display()))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
