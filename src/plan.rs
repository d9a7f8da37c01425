use serde::Serialize;
use tracing::{debug, warn};

use crate::canvas::DrawCommand;
use crate::eraser::{DEFAULT_ERASE_PADDING, erase_commands};
use crate::geometry::BoxPx;
use crate::layout::{FontScale, JobLayout, Orientation, TextMeasure, layout_job};
use crate::matcher::{DetectedRegion, ReplacementPair, match_replacements};
use crate::reading::{PhoneticAnnotator, ReadingConverter};

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub scale: FontScale,
    pub erase_padding: i32,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            scale: FontScale::default(),
            erase_padding: DEFAULT_ERASE_PADDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub from: String,
    pub to: String,
    pub region_text: String,
    pub orientation: Orientation,
    pub ruby: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditReport {
    pub annotation_boxes: usize,
    pub regions: usize,
    pub jobs: Vec<JobSummary>,
    pub not_found: Vec<String>,
    pub rejected: Vec<String>,
    pub annotation_failures: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditPlan {
    pub commands: Vec<DrawCommand>,
    pub report: EditReport,
}

/// Turns detections and instructions into an ordered list of draw commands.
///
/// All erasing comes first so that no later erase can clip text drawn for an
/// earlier job. Reading lookup failures drop the ruby for that job only.
pub fn plan_edit<R: ReadingConverter>(
    annotation_boxes: &[BoxPx],
    regions: &[DetectedRegion],
    pairs: &[ReplacementPair],
    annotator: &PhoneticAnnotator<R>,
    measure: &dyn TextMeasure,
    options: &PlanOptions,
) -> EditPlan {
    let mut report = EditReport {
        annotation_boxes: annotation_boxes.len(),
        regions: regions.len(),
        ..EditReport::default()
    };

    let outcome = match_replacements(regions, pairs);
    for pair in &outcome.rejected {
        warn!("replacement with empty source ignored (to: '{}')", pair.to);
        report.rejected.push(pair.to.clone());
    }
    for pair in &outcome.not_found {
        warn!("'{}' was not found in the image", pair.from);
        report.not_found.push(pair.from.clone());
    }

    let mut commands = erase_commands(
        annotation_boxes,
        outcome.jobs.iter().map(|job| &job.region.bbox),
        options.erase_padding,
    );

    for job in &outcome.jobs {
        let units = match annotator.annotate(&job.pair.to) {
            Ok(units) => units,
            Err(err) => {
                warn!("drawing '{}' without ruby: {}", job.pair.to, err);
                report.annotation_failures.push(job.pair.to.clone());
                Vec::new()
            }
        };
        let layout = layout_job(job, &units, &options.scale, measure);
        debug!(
            "'{}' -> '{}' in '{}' ({:?}, base {} / ruby {})",
            job.pair.from,
            job.pair.to,
            job.region.text,
            layout.orientation,
            layout.fonts.base,
            layout.fonts.ruby
        );
        report.jobs.push(JobSummary {
            from: job.pair.from.clone(),
            to: job.pair.to.clone(),
            region_text: job.region.text.clone(),
            orientation: layout.orientation,
            ruby: layout.annotations.len(),
        });
        push_layout(&mut commands, layout);
    }

    EditPlan { commands, report }
}

fn push_layout(commands: &mut Vec<DrawCommand>, layout: JobLayout) {
    let fonts = layout.fonts;
    commands.extend(layout.glyphs.into_iter().map(|glyph| DrawCommand::Glyph {
        text: glyph.text,
        position: glyph.position,
        font_size: fonts.base,
    }));
    commands.extend(
        layout
            .annotations
            .into_iter()
            .map(|annotation| DrawCommand::Ruby {
                text: annotation.reading,
                position: annotation.position,
                font_size: fonts.ruby,
                anchor_char_index: annotation.anchor_char_index,
            }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::reading::DictionaryReadings;
    use crate::test_util::{FailingReadings, FixedMeasure};

    fn annotator() -> PhoneticAnnotator<DictionaryReadings> {
        PhoneticAnnotator::new(DictionaryReadings::builtin().unwrap())
    }

    #[test]
    fn erases_before_drawing_and_draws_every_match() {
        let regions = vec![
            DetectedRegion::new(BoxPx::new(0, 0, 10, 100), "オレだ"),
            DetectedRegion::new(BoxPx::new(50, 0, 150, 20), "オレの"),
        ];
        let pairs = vec![ReplacementPair::new("オレ", "私")];
        let ruby = [BoxPx::new(12, 0, 16, 20)];
        let plan = plan_edit(
            &ruby,
            &regions,
            &pairs,
            &annotator(),
            &FixedMeasure,
            &PlanOptions::default(),
        );

        let first_draw = plan
            .commands
            .iter()
            .position(|c| !matches!(c, DrawCommand::Erase { .. }))
            .unwrap();
        assert_eq!(first_draw, 3);
        assert!(
            plan.commands[first_draw..]
                .iter()
                .all(|c| !matches!(c, DrawCommand::Erase { .. }))
        );
        assert_eq!(plan.report.jobs.len(), 2);
        assert_eq!(plan.report.jobs[0].orientation, Orientation::Vertical);
        assert_eq!(plan.report.jobs[1].orientation, Orientation::Horizontal);
        assert_eq!(plan.report.jobs[0].ruby, 1);
    }

    #[test]
    fn no_regions_leaves_only_annotation_erasure() {
        let ruby = [BoxPx::new(1, 1, 5, 5)];
        let pairs = vec![ReplacementPair::new("犬", "猫")];
        let plan = plan_edit(
            &ruby,
            &[],
            &pairs,
            &annotator(),
            &FixedMeasure,
            &PlanOptions::default(),
        );
        assert_eq!(
            plan.commands,
            vec![DrawCommand::Erase {
                bbox: BoxPx::new(1, 1, 5, 5)
            }]
        );
        assert_eq!(plan.report.not_found, vec!["犬".to_string()]);
    }

    #[test]
    fn reading_failure_draws_base_text_without_ruby() {
        let regions = vec![DetectedRegion::new(BoxPx::new(0, 0, 20, 60), "犬")];
        let pairs = vec![ReplacementPair::new("犬", "猫")];
        let plan = plan_edit(
            &[],
            &regions,
            &pairs,
            &PhoneticAnnotator::new(FailingReadings),
            &FixedMeasure,
            &PlanOptions::default(),
        );
        assert_eq!(plan.report.annotation_failures, vec!["猫".to_string()]);
        assert!(plan.commands.iter().any(|c| matches!(c, DrawCommand::Glyph { .. })));
        assert!(!plan.commands.iter().any(|c| matches!(c, DrawCommand::Ruby { .. })));
    }

    #[test]
    fn vertical_job_uses_height_derived_fonts() {
        let regions = vec![DetectedRegion::new(BoxPx::new(0, 0, 10, 100), "犬")];
        let pairs = vec![ReplacementPair::new("犬", "猫")];
        let plan = plan_edit(
            &[],
            &regions,
            &pairs,
            &annotator(),
            &FixedMeasure,
            &PlanOptions::default(),
        );
        assert_eq!(
            plan.commands[1],
            DrawCommand::Glyph {
                text: "猫".to_string(),
                position: Point::new(-35, 10),
                font_size: 80,
            }
        );
        assert_eq!(
            plan.commands[2],
            DrawCommand::Ruby {
                text: "ねこ".to_string(),
                position: Point::new(45, -5),
                font_size: 30,
                anchor_char_index: 0,
            }
        );
    }

    #[test]
    fn katakana_and_unlisted_kanji_replacements_get_ruby() {
        let regions = vec![DetectedRegion::new(BoxPx::new(0, 0, 120, 30), "私は勝つ")];
        for (to, reading) in [("オレ", "おれ"), ("勇者", "ゆうしゃ")] {
            let pairs = vec![ReplacementPair::new("私", to)];
            let plan = plan_edit(
                &[],
                &regions,
                &pairs,
                &annotator(),
                &FixedMeasure,
                &PlanOptions::default(),
            );
            let rubies: Vec<&DrawCommand> = plan
                .commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Ruby { .. }))
                .collect();
            assert_eq!(rubies.len(), 1, "ruby for {to}");
            assert!(matches!(
                rubies[0],
                DrawCommand::Ruby { text, anchor_char_index: 0, .. } if text == reading
            ));
            assert_eq!(plan.report.jobs[0].ruby, 1);
        }
    }
}
