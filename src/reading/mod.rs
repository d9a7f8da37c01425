mod dictionary;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::EditError;

pub use dictionary::DictionaryReadings;

/// A run of base text and its phonetic reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationUnit {
    pub original_unit: String,
    pub reading: String,
}

impl AnnotationUnit {
    pub fn new(original_unit: impl Into<String>, reading: impl Into<String>) -> Self {
        Self {
            original_unit: original_unit.into(),
            reading: reading.into(),
        }
    }

    /// Units whose reading differs from the base get ruby, katakana included.
    pub fn needs_ruby(&self) -> bool {
        !self.reading.is_empty() && self.reading != self.original_unit
    }
}

/// Reading-conversion backend.
pub trait ReadingConverter {
    fn convert(&self, text: &str) -> Result<Vec<AnnotationUnit>>;
}

impl<R: ReadingConverter + ?Sized> ReadingConverter for &R {
    fn convert(&self, text: &str) -> Result<Vec<AnnotationUnit>> {
        (**self).convert(text)
    }
}

/// Wraps a [`ReadingConverter`] and enforces that its units rebuild the input.
pub struct PhoneticAnnotator<R> {
    converter: R,
}

impl<R: ReadingConverter> PhoneticAnnotator<R> {
    pub fn new(converter: R) -> Self {
        Self { converter }
    }

    pub fn annotate(&self, text: &str) -> Result<Vec<AnnotationUnit>, EditError> {
        let units = self
            .converter
            .convert(text)
            .map_err(|err| EditError::AnnotationLookup {
                text: text.to_string(),
                reason: format!("{:#}", err),
            })?;
        let rebuilt: String = units
            .iter()
            .map(|unit| unit.original_unit.as_str())
            .collect();
        if rebuilt != text {
            return Err(EditError::AnnotationLookup {
                text: text.to_string(),
                reason: format!("units rebuild '{}' instead of the input", rebuilt),
            });
        }
        Ok(units)
    }
}

/// Pairs each unit with the index of the first base character it covers.
pub fn anchor_units(units: &[AnnotationUnit]) -> Vec<(usize, &AnnotationUnit)> {
    let mut offset = 0usize;
    units
        .iter()
        .map(|unit| {
            let anchor = offset;
            offset += unit.original_unit.chars().count();
            (anchor, unit)
        })
        .collect()
}

pub(crate) fn is_ideograph(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
    ) || ch == '々'
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Broken;

    impl ReadingConverter for Broken {
        fn convert(&self, _text: &str) -> Result<Vec<AnnotationUnit>> {
            Err(anyhow!("converter offline"))
        }
    }

    struct Lossy;

    impl ReadingConverter for Lossy {
        fn convert(&self, text: &str) -> Result<Vec<AnnotationUnit>> {
            Ok(text
                .chars()
                .skip(1)
                .map(|ch| AnnotationUnit::new(ch.to_string(), ch.to_string()))
                .collect())
        }
    }

    #[test]
    fn annotate_round_trips_through_dictionary() {
        let annotator = PhoneticAnnotator::new(DictionaryReadings::builtin().unwrap());
        for text in ["私の勝利だ", "オレ", "猫", "abc", ""] {
            let units = annotator.annotate(text).unwrap();
            let rebuilt: String = units.iter().map(|u| u.original_unit.as_str()).collect();
            assert_eq!(rebuilt, text);
        }
    }

    #[test]
    fn converter_error_becomes_annotation_lookup_failure() {
        let annotator = PhoneticAnnotator::new(Broken);
        let err = annotator.annotate("猫").unwrap_err();
        assert!(matches!(err, EditError::AnnotationLookup { .. }));
        assert!(err.to_string().contains("converter offline"));
    }

    #[test]
    fn lossy_converter_output_is_rejected() {
        let annotator = PhoneticAnnotator::new(Lossy);
        let err = annotator.annotate("勝利").unwrap_err();
        assert!(matches!(err, EditError::AnnotationLookup { .. }));
    }

    #[test]
    fn anchors_follow_character_offsets() {
        let units = vec![
            AnnotationUnit::new("勝利", "しょうり"),
            AnnotationUnit::new("の", "の"),
            AnnotationUnit::new("日", "ひ"),
        ];
        let anchors: Vec<usize> = anchor_units(&units).iter().map(|(idx, _)| *idx).collect();
        assert_eq!(anchors, vec![0, 2, 3]);
    }

    #[test]
    fn units_reading_differently_from_their_base_need_ruby() {
        assert!(AnnotationUnit::new("猫", "ねこ").needs_ruby());
        assert!(AnnotationUnit::new("オレ", "おれ").needs_ruby());
        assert!(!AnnotationUnit::new("ねこ", "ねこ").needs_ruby());
        assert!(!AnnotationUnit::new("猫", "").needs_ruby());
    }
}
