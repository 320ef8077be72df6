//! Precision signals
//!
//! The arbiter forwards a precision signal untouched; how precise a counter
//! description is gets decided by a [`PrecisionClassifier`] outside the
//! timing logic. [`KeywordClassifier`] is a heuristic implementation that
//! rewards long, concrete descriptions (direction, body target, technique,
//! weapon, stance, measurements).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opaque precision label attached to a counter attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecisionSignal(String);

impl PrecisionSignal {
    /// Wraps a classifier's label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrecisionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces a precision signal for a counter description.
pub trait PrecisionClassifier: Send + Sync {
    /// Classifies the free-text counter description.
    fn classify(&self, counter: &str) -> PrecisionSignal;
}

/// Graded precision produced by [`KeywordClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionLevel {
    /// Vague one-liners.
    VeryLow,
    /// Some detail.
    Low,
    /// A described technique or target.
    Medium,
    /// Several concrete details.
    High,
    /// Long, measured, fully specified action.
    VeryHigh,
}

impl PrecisionLevel {
    /// Maps a keyword score onto a level.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            8.. => Self::VeryHigh,
            6..=7 => Self::High,
            4..=5 => Self::Medium,
            2..=3 => Self::Low,
            _ => Self::VeryLow,
        }
    }

    /// Snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl From<PrecisionLevel> for PrecisionSignal {
    fn from(level: PrecisionLevel) -> Self {
        Self::new(level.as_str())
    }
}

static METRICS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s*(mètres?|metres?|meters?|cm|m\b|degrés?|degrees?|°|angle|secondes?|seconds?)")
        .expect("valid regex")
});
static DIRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(gauche|droite|devant|derrière|left|right|front|behind|diagonal|vertical|horizontal)")
        .expect("valid regex")
});
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tête|jambe|bras|torse|cou|épaule|genou|cheville|head|leg|arm|torso|chest|neck|shoulder|knee|ankle)")
        .expect("valid regex")
});
static TECHNIQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(uppercut|crochet|hook|direct|jab|cross|feinte|feint|esquive|dodge|parade|parry|riposte)")
        .expect("valid regex")
});
static EQUIPMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(épée|dague|bouclier|lance|arc|bâton|masse|hache|sword|dagger|shield|spear|bow|staff|mace|axe)")
        .expect("valid regex")
});
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(accroupi|debout|en garde|en position|en appui|en équilibre|crouch|standing|on guard|braced|balanced)")
        .expect("valid regex")
});

/// Keyword heuristic for counter precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Creates the classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Scores a counter description.
    ///
    /// Length contributes up to 4 points (the top step needs measurements
    /// too), then each kind of concrete detail adds to the score.
    #[must_use]
    pub fn score(counter: &str) -> u32 {
        let words = counter
            .split_whitespace()
            .filter(|w| w.chars().count() > 2)
            .count();
        let has_metrics = METRICS_RE.is_match(counter);

        let mut score = match words {
            25.. if has_metrics => 4,
            15.. => 3,
            8.. => 2,
            5.. => 1,
            _ => 0,
        };
        if DIRECTION_RE.is_match(counter) {
            score += 1;
        }
        if TARGET_RE.is_match(counter) {
            score += 1;
        }
        if TECHNIQUE_RE.is_match(counter) {
            score += 2;
        }
        if EQUIPMENT_RE.is_match(counter) {
            score += 1;
        }
        if POSITION_RE.is_match(counter) {
            score += 1;
        }
        if has_metrics {
            score += 2;
        }
        score
    }

    /// Grades a counter description.
    #[must_use]
    pub fn level(counter: &str) -> PrecisionLevel {
        PrecisionLevel::from_score(Self::score(counter))
    }
}

impl PrecisionClassifier for KeywordClassifier {
    fn classify(&self, counter: &str) -> PrecisionSignal {
        Self::level(counter).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vague_counter_is_very_low() {
        assert_eq!(KeywordClassifier::level("I block"), PrecisionLevel::VeryLow);
    }

    #[test]
    fn technique_and_target_raise_level() {
        // 8 words longer than 2 chars (2) + technique (2) + target (1)
        let level = KeywordClassifier::level("quick parry then strike toward the attacker knee");
        assert_eq!(level, PrecisionLevel::Medium);
    }

    #[test]
    fn measured_counter_is_very_high() {
        let counter = "Crouching low on guard, I sidestep left two meters and drive \
                       my dagger upward at a 45 degree angle into his shoulder";
        assert_eq!(KeywordClassifier::level(counter), PrecisionLevel::VeryHigh);
    }

    #[test]
    fn french_keywords_are_recognized() {
        let counter = "je fais une esquive vers la gauche puis un uppercut à la tête";
        assert!(KeywordClassifier::score(counter) >= 4);
    }

    #[test]
    fn classifier_emits_snake_case_signal() {
        let signal = KeywordClassifier::new().classify("hit");
        assert_eq!(signal, PrecisionSignal::new("very_low"));
    }

    #[test]
    fn score_boundaries() {
        assert_eq!(PrecisionLevel::from_score(0), PrecisionLevel::VeryLow);
        assert_eq!(PrecisionLevel::from_score(2), PrecisionLevel::Low);
        assert_eq!(PrecisionLevel::from_score(5), PrecisionLevel::Medium);
        assert_eq!(PrecisionLevel::from_score(7), PrecisionLevel::High);
        assert_eq!(PrecisionLevel::from_score(12), PrecisionLevel::VeryHigh);
    }
}
