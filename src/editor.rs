use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::canvas::{
    Canvas, CanvasStyle, DrawCommand, FontHandle, SvgCanvas, edited_path, save_image,
};
use crate::error::{EditError, ExternalService};
use crate::matcher::ReplacementPair;
use crate::plan::{EditReport, PlanOptions, plan_edit};
use crate::reading::{PhoneticAnnotator, ReadingConverter};
use crate::services::{AnnotationDetector, OcrClient};

/// Runs one image through detection, OCR, planning and drawing.
///
/// Every collaborator is owned by the editor; nothing is shared between
/// edits except what the caller passes in.
pub struct Editor<D, O, R> {
    detector: D,
    ocr: O,
    annotator: PhoneticAnnotator<R>,
    font: FontHandle,
    style: CanvasStyle,
    options: PlanOptions,
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub output_path: PathBuf,
    pub full_text: Option<String>,
    pub report: EditReport,
}

impl<D, O, R> Editor<D, O, R>
where
    D: AnnotationDetector,
    O: OcrClient,
    R: ReadingConverter,
{
    pub fn new(detector: D, ocr: O, readings: R, font: FontHandle) -> Self {
        Self {
            detector,
            ocr,
            annotator: PhoneticAnnotator::new(readings),
            font,
            style: CanvasStyle::default(),
            options: PlanOptions::default(),
        }
    }

    pub fn with_style(mut self, style: CanvasStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    /// Applies `pairs` to the image and writes `<stem>_edited.<ext>` next to it.
    ///
    /// Detector and OCR failures abort before anything is written.
    pub async fn edit(&self, image_path: &Path, pairs: &[ReplacementPair]) -> Result<EditOutcome> {
        let bytes = std::fs::read(image_path).map_err(|err| EditError::ImageLoad {
            path: image_path.display().to_string(),
            source: image::ImageError::IoError(err),
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| EditError::ImageLoad {
                path: image_path.display().to_string(),
                source,
            })?
            .to_rgba8();

        let annotation_boxes = self
            .detector
            .detect(image_path)
            .await
            .map_err(|err| EditError::service(ExternalService::AnnotationDetector, err))?;
        debug!("{} ruby boxes to erase", annotation_boxes.len());

        let ocr = self
            .ocr
            .detect_text(Arc::new(bytes))
            .await
            .map_err(|err| EditError::service(ExternalService::Ocr, err))?;
        match &ocr.full_text {
            Some(text) => debug!("full text: {}", text),
            None => info!("no text detected in {}", image_path.display()),
        }

        let plan = plan_edit(
            &annotation_boxes,
            &ocr.regions,
            pairs,
            &self.annotator,
            &self.font,
            &self.options,
        );

        let edited = if plan.commands.is_empty() {
            image
        } else {
            self.draw(image, &plan.commands)?
        };

        let output_path = edited_path(image_path);
        save_image(&edited, &output_path).map_err(|err| EditError::ImageSave {
            path: output_path.display().to_string(),
            message: format!("{:#}", err),
        })?;
        info!("saved {}", output_path.display());

        Ok(EditOutcome {
            output_path,
            full_text: ocr.full_text,
            report: plan.report,
        })
    }

    fn draw(&self, image: RgbaImage, commands: &[DrawCommand]) -> Result<RgbaImage> {
        let mut canvas = SvgCanvas::new(image, self.font.clone(), self.style.clone());
        canvas.draw_all(commands);
        canvas
            .render()
            .with_context(|| "failed to rasterize edited image")
    }
}
