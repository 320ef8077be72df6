//! Configuration schema types
//!
//! `EngineConfig` is deserialized from YAML. Every field has a default, so
//! an empty mapping yields the stock rank table and timings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::window::{RankDurationTable, RankEntry};

/// Default monitor tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Default reminder thresholds, longest first.
pub const DEFAULT_REMINDER_THRESHOLDS: [Duration; 3] = [
    Duration::from_secs(30),
    Duration::from_secs(10),
    Duration::from_secs(5),
];

/// Root configuration for a defense engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// How often the monitor sweeps open windows
    #[serde(default = "default_tick_interval", with = "crate::config::duration")]
    pub tick_interval: Duration,

    /// Remaining-time marks that trigger a reminder, longest first
    #[serde(
        default = "default_reminder_thresholds",
        with = "crate::config::duration::list"
    )]
    pub reminder_thresholds: Vec<Duration>,

    /// Seed for reproducible success rolls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Rank table, lowest rank first
    #[serde(default = "default_ranks")]
    pub ranks: Vec<RankEntry>,

    /// Also send a verdict when a counter attempt resolves a window
    #[serde(default)]
    pub announce_resolutions: bool,
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

fn default_reminder_thresholds() -> Vec<Duration> {
    DEFAULT_REMINDER_THRESHOLDS.to_vec()
}

fn default_ranks() -> Vec<RankEntry> {
    RankDurationTable::default().entries().to_vec()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            reminder_thresholds: default_reminder_thresholds(),
            seed: None,
            ranks: default_ranks(),
            announce_resolutions: false,
        }
    }
}

impl EngineConfig {
    /// Builds the rank lookup table.
    #[must_use]
    pub fn rank_table(&self) -> RankDurationTable {
        RankDurationTable::new(self.ranks.clone())
    }

    /// Thresholds sorted longest first, deduplicated, zero removed.
    #[must_use]
    pub fn sorted_thresholds(&self) -> Vec<Duration> {
        let mut thresholds: Vec<Duration> = self
            .reminder_thresholds
            .iter()
            .copied()
            .filter(|t| !t.is_zero())
            .collect();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        thresholds
    }
}
