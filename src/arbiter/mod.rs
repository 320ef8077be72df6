//! Counter-attack arbitration
//!
//! Grades a counter attempt against its open window and resolves the window.
//!
//! # Architecture
//!
//! - [`TimingTier`]: Elapsed-ratio bands with multiplier and success rate
//! - [`Arbiter`]: Lookup, grading, weighted roll, terminal transition
//! - [`PrecisionClassifier`]: External grading of the counter text, passed through

pub mod precision;
pub mod tier;

pub use precision::{KeywordClassifier, PrecisionClassifier, PrecisionLevel, PrecisionSignal};
pub use tier::{TIER_BANDS, TierBand, TimingTier};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::observability::metrics;
use crate::window::registry::lock;
use crate::window::{ContextId, Rank, SubjectId, WindowId, WindowRegistry, WindowStatus};

/// Scored result of a counter attempt that reached an open window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterAttemptResult {
    /// Window the attempt resolved
    pub window_id: WindowId,
    /// Defending subject
    pub subject_id: SubjectId,
    /// Routing context
    pub context_id: ContextId,
    /// Rank the window was opened with
    pub rank: Rank,
    /// Attack summary carried from the window
    pub attack: String,
    /// Counter description as submitted
    pub counter: String,
    /// Whether the counter landed
    pub success: bool,
    /// Timing grade
    pub tier: TimingTier,
    /// Fraction of the window used, in `[0, 1]`
    pub elapsed_ratio: f64,
    /// Raw reaction time, unclamped
    #[serde(with = "crate::config::duration")]
    pub elapsed: Duration,
    /// Damage multiplier for the tier
    pub damage_multiplier: f64,
    /// Success probability the roll was made against
    pub success_rate: f64,
    /// Precision signal supplied with the attempt
    pub precision: Option<PrecisionSignal>,
}

impl CounterAttemptResult {
    /// Elapsed ratio as a percentage.
    #[must_use]
    pub fn elapsed_percent(&self) -> f64 {
        self.elapsed_ratio * 100.0
    }

    /// Terminal status the window was moved to.
    #[must_use]
    pub const fn status(&self) -> WindowStatus {
        if self.success {
            WindowStatus::ResolvedSuccess
        } else {
            WindowStatus::ResolvedFailure
        }
    }
}

/// Outcome of [`Arbiter::attempt`].
///
/// `WindowNotFound` is the normal answer for a counter that arrives after
/// the window was resolved or expired, or for an id that never existed.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The attempt resolved the window.
    Resolved(CounterAttemptResult),
    /// No waiting window exists for the id.
    WindowNotFound,
}

impl AttemptOutcome {
    /// Returns whether the attempt resolved a window.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Borrows the result, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&CounterAttemptResult> {
        match self {
            Self::Resolved(result) => Some(result),
            Self::WindowNotFound => None,
        }
    }

    /// Consumes the outcome, returning the result if any.
    #[must_use]
    pub fn into_result(self) -> Option<CounterAttemptResult> {
        match self {
            Self::Resolved(result) => Some(result),
            Self::WindowNotFound => None,
        }
    }
}

/// Random source for success rolls.
#[derive(Debug)]
enum RollSource {
    Thread,
    Seeded(StdRng),
}

/// Grades counter attempts and resolves their windows.
#[derive(Debug)]
pub struct Arbiter {
    registry: Arc<WindowRegistry>,
    rolls: Mutex<RollSource>,
}

impl Arbiter {
    /// Creates an arbiter that rolls with the thread-local RNG.
    #[must_use]
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        Self {
            registry,
            rolls: Mutex::new(RollSource::Thread),
        }
    }

    /// Creates an arbiter with a reproducible roll sequence.
    #[must_use]
    pub fn seeded(registry: Arc<WindowRegistry>, seed: u64) -> Self {
        Self {
            registry,
            rolls: Mutex::new(RollSource::Seeded(StdRng::seed_from_u64(seed))),
        }
    }

    /// Draws one uniform value in `[0, 1)`.
    fn roll(&self) -> f64 {
        let mut source = self.rolls.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *source {
            RollSource::Thread => rand::random::<f64>(),
            RollSource::Seeded(rng) => rng.random::<f64>(),
        }
    }

    /// Arbitrates a counter attempt against window `id` at the current time.
    pub fn attempt(
        &self,
        id: &WindowId,
        counter: &str,
        precision: Option<PrecisionSignal>,
    ) -> AttemptOutcome {
        let roll = self.roll();
        self.attempt_at(id, counter, precision, Instant::now(), roll)
    }

    /// Arbitrates a counter attempt at `now` with a given `roll` in `[0, 1)`.
    ///
    /// The status check, grading and terminal transition all happen under
    /// the window's lock, so a concurrent expiry sweep either finalizes the
    /// window first (and this returns `WindowNotFound`) or observes it
    /// already resolved.
    pub fn attempt_at(
        &self,
        id: &WindowId,
        counter: &str,
        precision: Option<PrecisionSignal>,
        now: Instant,
        roll: f64,
    ) -> AttemptOutcome {
        let Some(handle) = self.registry.handle(id) else {
            debug!(window_id = %id, "counter attempt for unknown window");
            return AttemptOutcome::WindowNotFound;
        };

        let result = {
            let mut window = lock(&handle);
            if window.status().is_terminal() {
                debug!(window_id = %id, status = %window.status(), "counter attempt for closed window");
                return AttemptOutcome::WindowNotFound;
            }

            let elapsed_ratio = window.elapsed_ratio(now);
            let tier = TimingTier::classify(elapsed_ratio);
            let success = roll < tier.success_rate();
            window.resolve(success);

            CounterAttemptResult {
                window_id: window.id().clone(),
                subject_id: window.subject_id().clone(),
                context_id: window.context_id().clone(),
                rank: window.rank().clone(),
                attack: window.attack().to_string(),
                counter: counter.to_string(),
                success,
                tier,
                elapsed_ratio,
                elapsed: window.elapsed(now),
                damage_multiplier: tier.damage_multiplier(),
                success_rate: tier.success_rate(),
                precision,
            }
        };

        self.registry.remove_handle(id, &handle);
        metrics::record_window_resolved(result.tier.as_str(), result.success, result.elapsed_ratio);
        metrics::set_windows_active(self.registry.len());

        info!(
            window_id = %id,
            subject = %result.subject_id,
            tier = %result.tier,
            success = result.success,
            elapsed_pct = result.elapsed_percent(),
            "counter attempt resolved window"
        );

        AttemptOutcome::Resolved(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::ReactionWindow;

    fn setup(secs: u64) -> (Arc<WindowRegistry>, Arbiter, Instant) {
        let registry = Arc::new(WindowRegistry::new());
        let arbiter = Arbiter::new(Arc::clone(&registry));
        let t0 = Instant::now();
        registry
            .open(ReactionWindow::new(
                WindowId::new("atk-1"),
                SubjectId::new("p1"),
                ContextId::new("room"),
                Rank::new("A"),
                "overhead slash",
                Duration::from_secs(secs),
                t0,
            ))
            .unwrap();
        (registry, arbiter, t0)
    }

    #[test]
    fn good_tier_at_thirty_percent() {
        let (registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");

        let outcome = arbiter.attempt_at(&id, "parry", None, t0 + Duration::from_secs(9), 0.5);
        let result = outcome.into_result().unwrap();
        assert_eq!(result.tier, TimingTier::Good);
        assert!((result.elapsed_ratio - 0.3).abs() < 1e-9);
        assert!((result.damage_multiplier - 1.8).abs() < f64::EPSILON);
        assert!(result.success);
        assert_eq!(result.status(), WindowStatus::ResolvedSuccess);
        assert_eq!(result.attack, "overhead slash");
        assert!(registry.is_empty());
    }

    #[test]
    fn roll_above_rate_fails() {
        let (_registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");

        let result = arbiter
            .attempt_at(&id, "parry", None, t0 + Duration::from_secs(9), 0.85)
            .into_result()
            .unwrap();
        assert_eq!(result.tier, TimingTier::Good);
        assert!(!result.success);
        assert_eq!(result.status(), WindowStatus::ResolvedFailure);
    }

    #[test]
    fn second_attempt_is_not_found() {
        let (_registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");
        let at = t0 + Duration::from_secs(9);

        assert!(arbiter.attempt_at(&id, "parry", None, at, 0.0).is_resolved());
        assert_eq!(
            arbiter.attempt_at(&id, "parry again", None, at, 0.0),
            AttemptOutcome::WindowNotFound
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (_registry, arbiter, _t0) = setup(30);
        let outcome = arbiter.attempt(&WindowId::new("nope"), "dodge", None);
        assert_eq!(outcome, AttemptOutcome::WindowNotFound);
        assert!(outcome.result().is_none());
    }

    #[test]
    fn attempt_at_deadline_is_failed() {
        let (_registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");

        let result = arbiter
            .attempt_at(&id, "dodge", None, t0 + Duration::from_secs(30), 0.0)
            .into_result()
            .unwrap();
        assert_eq!(result.tier, TimingTier::Failed);
        assert!(result.damage_multiplier.abs() < f64::EPSILON);
        assert!(!result.success);
    }

    #[test]
    fn late_attempt_past_deadline_is_failed_not_rejected() {
        let (_registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");

        let result = arbiter
            .attempt_at(&id, "dodge", None, t0 + Duration::from_secs(45), 0.0)
            .into_result()
            .unwrap();
        assert_eq!(result.tier, TimingTier::Failed);
        assert!((result.elapsed_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.elapsed, Duration::from_secs(45));
    }

    #[test]
    fn precision_is_passed_through() {
        let (_registry, arbiter, t0) = setup(30);
        let id = WindowId::new("atk-1");
        let signal = PrecisionSignal::new("high");

        let result = arbiter
            .attempt_at(&id, "parry", Some(signal.clone()), t0, 0.99)
            .into_result()
            .unwrap();
        assert_eq!(result.tier, TimingTier::Perfect);
        assert!(result.success);
        assert_eq!(result.precision, Some(signal));
    }

    #[test]
    fn seeded_arbiters_roll_identically() {
        let registry = Arc::new(WindowRegistry::new());
        let a = Arbiter::seeded(Arc::clone(&registry), 7);
        let b = Arbiter::seeded(registry, 7);
        let rolls_a: Vec<f64> = (0..8).map(|_| a.roll()).collect();
        let rolls_b: Vec<f64> = (0..8).map(|_| b.roll()).collect();
        assert_eq!(rolls_a, rolls_b);
        assert!(rolls_a.iter().all(|r| (0.0..1.0).contains(r)));
    }
}
