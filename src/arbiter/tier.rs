//! Timing tiers
//!
//! A counter attempt is graded by how much of its window it used. The bands
//! are fixed, ordered, and non-overlapping; each carries a damage multiplier
//! and the probability that an attempt in that band lands.

use serde::{Deserialize, Serialize};

/// Grade of a counter attempt's timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingTier {
    /// First fifth of the window.
    Perfect,
    /// Up to half the window.
    Good,
    /// Up to three quarters.
    Normal,
    /// Up to 95%.
    Late,
    /// The last sliver of the window, or past it.
    Failed,
}

/// Elapsed-ratio band for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBand {
    /// Tier this band grades to
    pub tier: TimingTier,
    /// Inclusive lower bound of the elapsed ratio
    pub lower: f64,
    /// Exclusive upper bound (inclusive for the last band)
    pub upper: f64,
    /// Damage multiplier handed to damage computation
    pub damage_multiplier: f64,
    /// Probability that an attempt in this band succeeds
    pub success_rate: f64,
}

/// All bands, fastest first.
pub const TIER_BANDS: [TierBand; 5] = [
    TierBand {
        tier: TimingTier::Perfect,
        lower: 0.0,
        upper: 0.2,
        damage_multiplier: 2.5,
        success_rate: 1.0,
    },
    TierBand {
        tier: TimingTier::Good,
        lower: 0.2,
        upper: 0.5,
        damage_multiplier: 1.8,
        success_rate: 0.85,
    },
    TierBand {
        tier: TimingTier::Normal,
        lower: 0.5,
        upper: 0.75,
        damage_multiplier: 1.3,
        success_rate: 0.6,
    },
    TierBand {
        tier: TimingTier::Late,
        lower: 0.75,
        upper: 0.95,
        damage_multiplier: 0.8,
        success_rate: 0.3,
    },
    TierBand {
        tier: TimingTier::Failed,
        lower: 0.95,
        upper: 1.0,
        damage_multiplier: 0.0,
        success_rate: 0.0,
    },
];

impl TimingTier {
    /// Every tier, fastest first.
    pub const ALL: [Self; 5] = [
        Self::Perfect,
        Self::Good,
        Self::Normal,
        Self::Late,
        Self::Failed,
    ];

    /// Grades an elapsed ratio.
    ///
    /// Ratios beyond the window (scheduling delay, clock skew) and NaN grade
    /// as [`TimingTier::Failed`] rather than being rejected.
    #[must_use]
    pub fn classify(elapsed_ratio: f64) -> Self {
        if elapsed_ratio.is_nan() {
            return Self::Failed;
        }
        let ratio = elapsed_ratio.clamp(0.0, 1.0);
        TIER_BANDS
            .iter()
            .find(|band| ratio >= band.lower && ratio < band.upper)
            .map_or(Self::Failed, |band| band.tier)
    }

    /// The band describing this tier.
    #[must_use]
    pub const fn band(self) -> &'static TierBand {
        match self {
            Self::Perfect => &TIER_BANDS[0],
            Self::Good => &TIER_BANDS[1],
            Self::Normal => &TIER_BANDS[2],
            Self::Late => &TIER_BANDS[3],
            Self::Failed => &TIER_BANDS[4],
        }
    }

    /// Damage multiplier for this tier.
    #[must_use]
    pub const fn damage_multiplier(self) -> f64 {
        self.band().damage_multiplier
    }

    /// Success probability for this tier.
    #[must_use]
    pub const fn success_rate(self) -> f64 {
        self.band().success_rate
    }

    /// Lower-case tier name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Good => "good",
            Self::Normal => "normal",
            Self::Late => "late",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TimingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
