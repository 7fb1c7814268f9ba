//! Forge UI state detection from recognized text.
//!
//! Decides whether the forge screen is open and whether any ore slots are
//! filled, using phrase matching over the OCR output of the ore panel.

use serde::{Deserialize, Serialize};

/// Result of classifying one block of recognized text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiVerdict {
    /// The forge UI appears to be open
    pub is_ready: bool,
    /// At least one ore slot is not empty
    pub has_targets: bool,
}

/// Phrase sets and thresholds for forge UI detection.
///
/// The defaults were tuned on a handful of screenshots; they are exposed in
/// the settings file so they can be recalibrated without a rebuild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Phrases that appear on the forge screen (matched lowercase)
    pub indicators: Vec<String>,
    /// Label shown in an unfilled ore slot
    pub empty_phrase: String,
    /// Distinct indicators needed to call the UI open
    pub min_indicator_matches: usize,
    /// Empty-slot occurrences at which every slot is considered empty
    pub empty_slot_limit: usize,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            indicators: ["forge chances", "select ores", "forge!", "empty", "multiplier"]
                .into_iter()
                .map(String::from)
                .collect(),
            empty_phrase: "empty".to_string(),
            min_indicator_matches: 2,
            empty_slot_limit: 4,
        }
    }
}

/// Classifies text with the default thresholds.
pub fn classify(text: &str) -> UiVerdict {
    classify_with(text, &DetectionThresholds::default())
}

/// Classifies recognized text as forge UI state.
///
/// `is_ready` holds when enough distinct indicators match, or when the
/// empty-slot phrase shows up at all. The second clause is looser than the
/// first and can fire on a single stray "empty"; that is the shipped behavior.
/// `has_targets` holds while the empty-slot phrase occurs fewer than
/// `empty_slot_limit` times, counting repeats.
pub fn classify_with(text: &str, thresholds: &DetectionThresholds) -> UiVerdict {
    let lower = text.to_lowercase();

    let matches = thresholds
        .indicators
        .iter()
        .filter(|phrase| !phrase.is_empty() && lower.contains(phrase.to_lowercase().as_str()))
        .count();

    let empty_phrase = thresholds.empty_phrase.to_lowercase();
    let empty_count = if empty_phrase.is_empty() {
        0
    } else {
        lower.matches(empty_phrase.as_str()).count()
    };

    let is_ready = matches >= thresholds.min_indicator_matches || empty_count > 0;
    let has_targets = empty_count < thresholds.empty_slot_limit;

    UiVerdict {
        is_ready,
        has_targets,
    }
}
