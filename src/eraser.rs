use crate::canvas::DrawCommand;
use crate::geometry::BoxPx;

pub const DEFAULT_ERASE_PADDING: i32 = 5;

/// Blanks ruby boxes as-is, then matched text boxes grown by `padding`.
///
/// A region matched by several pairs is erased once.
pub fn erase_commands<'a, I>(annotation_boxes: &[BoxPx], matched: I, padding: i32) -> Vec<DrawCommand>
where
    I: IntoIterator<Item = &'a BoxPx>,
{
    let mut commands: Vec<DrawCommand> = annotation_boxes
        .iter()
        .map(|bbox| DrawCommand::Erase { bbox: *bbox })
        .collect();

    let mut seen: Vec<BoxPx> = Vec::new();
    for bbox in matched {
        if seen.contains(bbox) {
            continue;
        }
        seen.push(*bbox);
        commands.push(DrawCommand::Erase {
            bbox: bbox.padded(padding),
        });
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erased(commands: &[DrawCommand]) -> Vec<BoxPx> {
        commands
            .iter()
            .map(|command| match command {
                DrawCommand::Erase { bbox } => *bbox,
                other => panic!("unexpected command {other}"),
            })
            .collect()
    }

    #[test]
    fn annotation_boxes_are_tight_and_text_boxes_padded() {
        let ruby = [BoxPx::new(40, 0, 48, 30)];
        let text = [BoxPx::new(10, 10, 20, 100)];
        let commands = erase_commands(&ruby, text.iter(), DEFAULT_ERASE_PADDING);
        assert_eq!(
            erased(&commands),
            vec![BoxPx::new(40, 0, 48, 30), BoxPx::new(5, 5, 25, 105)]
        );
    }

    #[test]
    fn repeated_matches_erase_once() {
        let text = [BoxPx::new(0, 0, 10, 10), BoxPx::new(0, 0, 10, 10)];
        let commands = erase_commands(&[], text.iter(), 2);
        assert_eq!(erased(&commands), vec![BoxPx::new(-2, -2, 12, 12)]);
    }

    #[test]
    fn nothing_to_erase() {
        assert!(erase_commands(&[], std::iter::empty(), 5).is_empty());
    }
}
