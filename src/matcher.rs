use serde::{Deserialize, Serialize};

use crate::geometry::BoxPx;
use crate::layout::{Orientation, orientation};

/// One `{from, to}` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementPair {
    pub from: String,
    pub to: String,
}

impl ReplacementPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Text region reported by OCR, reduced to an axis-aligned box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedRegion {
    pub bbox: BoxPx,
    pub text: String,
}

impl DetectedRegion {
    pub fn new(bbox: BoxPx, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

/// A matched region paired with the instruction that matched it.
#[derive(Debug, Clone, Copy)]
pub struct PlacementJob<'a> {
    pub region: &'a DetectedRegion,
    pub pair: &'a ReplacementPair,
    pub orientation: Orientation,
}

#[derive(Debug, Default)]
pub struct MatchOutcome<'a> {
    pub jobs: Vec<PlacementJob<'a>>,
    /// Pairs whose `from` occurs in no region.
    pub not_found: Vec<&'a ReplacementPair>,
    /// Pairs with an empty `from`, which would otherwise match every region.
    pub rejected: Vec<&'a ReplacementPair>,
}

/// Emits one job per (pair, region) where the region text contains `from`.
///
/// Pairs are visited in input order and regions in OCR order, so jobs come
/// out grouped by pair and ordered by region within each group. Matching is
/// exact and case-sensitive.
pub fn match_replacements<'a>(
    regions: &'a [DetectedRegion],
    pairs: &'a [ReplacementPair],
) -> MatchOutcome<'a> {
    let mut outcome = MatchOutcome::default();
    for pair in pairs {
        if pair.from.is_empty() {
            outcome.rejected.push(pair);
            continue;
        }
        let before = outcome.jobs.len();
        for region in regions {
            if region.text.contains(pair.from.as_str()) {
                outcome.jobs.push(PlacementJob {
                    region,
                    pair,
                    orientation: orientation(&region.bbox),
                });
            }
        }
        if outcome.jobs.len() == before {
            outcome.not_found.push(pair);
        }
    }
    outcome
}
