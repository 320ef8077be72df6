//! Rank duration policy
//!
//! Maps a defender's power rank to the length of their reaction window.
//! Faster-tiered defenders get strictly shorter windows. A rank the table
//! does not know falls back to the longest window so play never stalls on
//! an unrecognized rank.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Window length used when the table is empty.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(360);

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Power rank of an actor (e.g. `"A"`, `"S+"`, `"MONARQUE"`).
///
/// Stored trimmed and upper-cased so lookups are case-insensitive.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Rank(String);

impl Rank {
    /// Creates a normalized rank.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// Returns the normalized rank name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Rank {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Rank {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the rank table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    /// Rank name
    pub rank: Rank,
    /// Reaction window granted at this rank
    #[serde(with = "crate::config::duration")]
    pub window: Duration,
}

impl RankEntry {
    /// Creates a table row.
    #[must_use]
    pub fn new(rank: impl Into<Rank>, window: Duration) -> Self {
        Self {
            rank: rank.into(),
            window,
        }
    }
}

/// Rank to window duration lookup.
///
/// Entries are kept in configuration order, lowest rank first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankDurationTable {
    entries: Vec<RankEntry>,
    fallback: Duration,
}

impl RankDurationTable {
    /// Builds a table from rows ordered lowest rank first.
    ///
    /// The fallback for unknown ranks is the longest configured window.
    #[must_use]
    pub fn new(entries: Vec<RankEntry>) -> Self {
        let fallback = entries
            .iter()
            .map(|e| e.window)
            .max()
            .unwrap_or(DEFAULT_WINDOW);
        Self { entries, fallback }
    }

    /// Returns the window length for `rank`, or the fallback if unknown.
    #[must_use]
    pub fn duration(&self, rank: &Rank) -> Duration {
        if let Some(window) = self.get(rank) {
            return window;
        }
        match self.closest(rank.as_str()) {
            Some(hint) => debug!(
                rank = %rank,
                closest = %hint,
                fallback_ms = self.fallback.as_millis(),
                "unknown rank, using longest window"
            ),
            None => debug!(
                rank = %rank,
                fallback_ms = self.fallback.as_millis(),
                "unknown rank, using longest window"
            ),
        }
        self.fallback
    }

    /// Returns the configured window for `rank` without falling back.
    #[must_use]
    pub fn get(&self, rank: &Rank) -> Option<Duration> {
        self.entries
            .iter()
            .find(|e| &e.rank == rank)
            .map(|e| e.window)
    }

    /// Returns whether `rank` is configured.
    #[must_use]
    pub fn contains(&self, rank: &Rank) -> bool {
        self.get(rank).is_some()
    }

    /// Returns the window used for unknown ranks.
    #[must_use]
    pub const fn fallback(&self) -> Duration {
        self.fallback
    }

    /// Returns the rows in configuration order.
    #[must_use]
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// Returns the configured rank most similar to `raw`, if any is close.
    #[must_use]
    pub fn closest(&self, raw: &str) -> Option<&Rank> {
        let needle = raw.trim().to_uppercase();
        self.entries
            .iter()
            .map(|e| (strsim::jaro_winkler(&needle, e.rank.as_str()), &e.rank))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, rank)| rank)
    }
}

impl Default for RankDurationTable {
    fn default() -> Self {
        Self::new(vec![
            RankEntry::new("G", Duration::from_secs(360)),
            RankEntry::new("F", Duration::from_secs(300)),
            RankEntry::new("E", Duration::from_secs(240)),
            RankEntry::new("D", Duration::from_secs(180)),
            RankEntry::new("C", Duration::from_secs(120)),
            RankEntry::new("B", Duration::from_secs(60)),
            RankEntry::new("A", Duration::from_secs(30)),
            RankEntry::new("S", Duration::from_secs(15)),
            RankEntry::new("S+", Duration::from_secs(10)),
            RankEntry::new("SS", Duration::from_secs(8)),
            RankEntry::new("SSS", Duration::from_secs(5)),
            RankEntry::new("MONARQUE", Duration::from_secs(3)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_a_is_thirty_seconds() {
        let table = RankDurationTable::default();
        assert_eq!(table.duration(&Rank::new("A")), Duration::from_millis(30_000));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = RankDurationTable::default();
        assert_eq!(table.duration(&Rank::new(" s+ ")), Duration::from_secs(10));
        assert_eq!(table.duration(&Rank::new("monarque")), Duration::from_secs(3));
    }

    #[test]
    fn higher_ranks_are_strictly_faster() {
        let table = RankDurationTable::default();
        for pair in table.entries().windows(2) {
            assert!(
                pair[1].window < pair[0].window,
                "{} should be faster than {}",
                pair[1].rank,
                pair[0].rank
            );
        }
    }

    #[test]
    fn unknown_rank_falls_back_to_longest() {
        let table = RankDurationTable::default();
        assert_eq!(table.duration(&Rank::new("Z")), Duration::from_secs(360));
        assert!(!table.contains(&Rank::new("Z")));
    }

    #[test]
    fn fallback_follows_configured_table() {
        let table = RankDurationTable::new(vec![
            RankEntry::new("low", Duration::from_secs(20)),
            RankEntry::new("high", Duration::from_secs(5)),
        ]);
        assert_eq!(table.fallback(), Duration::from_secs(20));
        assert_eq!(table.duration(&Rank::new("mid")), Duration::from_secs(20));
    }

    #[test]
    fn empty_table_uses_default_window() {
        let table = RankDurationTable::new(Vec::new());
        assert_eq!(table.duration(&Rank::new("A")), DEFAULT_WINDOW);
    }

    #[test]
    fn closest_suggests_near_miss() {
        let table = RankDurationTable::default();
        assert_eq!(table.closest("monarq").map(Rank::as_str), Some("MONARQUE"));
        assert!(table.closest("zzzzzzzz").is_none());
    }

    #[test]
    fn rank_deserializes_normalized() {
        let rank: Rank = serde_json::from_str("\"sss\"").unwrap();
        assert_eq!(rank, Rank::new("SSS"));
    }
}
