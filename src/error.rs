use std::fmt;

use thiserror::Error;

/// Collaborators whose failure aborts an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    AnnotationDetector,
    Ocr,
    InstructionParser,
}

impl ExternalService {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalService::AnnotationDetector => "annotation detector",
            ExternalService::Ocr => "OCR service",
            ExternalService::InstructionParser => "instruction parser",
        }
    }
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EditError {
    /// Fatal: no image is written.
    #[error("{service} failed: {message}")]
    ExternalService {
        service: ExternalService,
        message: String,
    },

    /// Recoverable: the run is drawn without ruby.
    #[error("reading lookup failed for '{text}': {reason}")]
    AnnotationLookup { text: String, reason: String },

    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to save edited image {path}: {message}")]
    ImageSave { path: String, message: String },
}

impl EditError {
    pub fn service(service: ExternalService, err: anyhow::Error) -> Self {
        EditError::ExternalService {
            service,
            message: format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn service_failure_keeps_context_chain() {
        let err = anyhow!("connection refused").context("failed to call Vision API");
        let edit = EditError::service(ExternalService::Ocr, err);
        assert_eq!(
            edit.to_string(),
            "OCR service failed: failed to call Vision API: connection refused"
        );
    }

    #[test]
    fn annotation_lookup_names_the_text() {
        let err = EditError::AnnotationLookup {
            text: "猫".to_string(),
            reason: "offline".to_string(),
        };
        assert_eq!(err.to_string(), "reading lookup failed for '猫': offline");
    }
}
