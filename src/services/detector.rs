use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{AnnotationDetector, DEFAULT_COMMAND_TIMEOUT, DetectorFuture, run_command};
use crate::geometry::BoxPx;

/// Runs an external detector as `program [args...] <image>`; stdout is JSON boxes.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl AnnotationDetector for CommandDetector {
    fn detect(&self, image_path: &Path) -> DetectorFuture {
        let detector = self.clone();
        let image_path = image_path.to_path_buf();
        Box::pin(async move {
            let mut command = Command::new(&detector.program);
            command.args(&detector.args).arg(&image_path);
            let name = format!("detector '{}'", detector.program);
            let output = run_command(command, &name, detector.timeout).await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(anyhow!(
                    "{} failed ({}): {}",
                    name,
                    output.status,
                    stderr.trim()
                ));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let boxes = parse_detector_output(&stdout)?;
            debug!("{} found {} ruby boxes", name, boxes.len());
            Ok(boxes)
        })
    }
}

/// Used when no detector is configured; finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl AnnotationDetector for NoDetector {
    fn detect(&self, _image_path: &Path) -> DetectorFuture {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[derive(Debug, Clone)]
pub enum DetectorImpl {
    Command(CommandDetector),
    None(NoDetector),
}

impl AnnotationDetector for DetectorImpl {
    fn detect(&self, image_path: &Path) -> DetectorFuture {
        match self {
            DetectorImpl::Command(detector) => detector.detect(image_path),
            DetectorImpl::None(detector) => detector.detect(image_path),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectorOutput {
    Boxes(Vec<BoxPx>),
    Wrapped { boxes: Vec<BoxPx> },
}

/// Accepts `[[x0, y0, x1, y1], ...]` or `{"boxes": [...]}`; blank output means no boxes.
pub fn parse_detector_output(stdout: &str) -> Result<Vec<BoxPx>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parsed: DetectorOutput =
        serde_json::from_str(trimmed).with_context(|| "detector output is not a box list")?;
    Ok(match parsed {
        DetectorOutput::Boxes(boxes) => boxes,
        DetectorOutput::Wrapped { boxes } => boxes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_wrapped_box_lists() {
        let bare = parse_detector_output("[[1, 2, 3, 4], [10, 20, 30, 40]]").unwrap();
        assert_eq!(bare, vec![BoxPx::new(1, 2, 3, 4), BoxPx::new(10, 20, 30, 40)]);

        let wrapped = parse_detector_output(r#"{"boxes": [[5, 6, 7, 8]]}"#).unwrap();
        assert_eq!(wrapped, vec![BoxPx::new(5, 6, 7, 8)]);
    }

    #[test]
    fn blank_output_is_no_boxes() {
        assert!(parse_detector_output("  \n").unwrap().is_empty());
        assert!(parse_detector_output("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(parse_detector_output("boxes: none").is_err());
        assert!(parse_detector_output("[[1, 2, 3]]").is_err());
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let detector = CommandDetector::new("balloon-edit-no-such-detector", Vec::new());
        assert!(detector.detect(Path::new("page.png")).await.is_err());
    }

    #[tokio::test]
    async fn image_path_is_the_last_argument() {
        let detector = CommandDetector::new(
            "sh",
            vec![
                "-c".to_string(),
                "case \"$1\" in page.png) echo '[[1, 2, 3, 4]]';; esac".to_string(),
                "sh".to_string(),
            ],
        );
        let boxes = detector.detect(Path::new("page.png")).await.unwrap();
        assert_eq!(boxes, vec![BoxPx::new(1, 2, 3, 4)]);
    }

    #[tokio::test]
    async fn hung_detector_fails_instead_of_waiting() {
        let detector = CommandDetector::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string(), "sh".to_string()],
        )
        .with_timeout(Duration::from_millis(200));
        let err = detector.detect(Path::new("page.png")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
