//! Reaction window state
//!
//! A window leaves [`WindowStatus::Waiting`] exactly once. Both terminal
//! paths (`resolve` from the arbiter, `expire` from the monitor) are
//! check-and-set operations on `&mut self`; callers hold the window's
//! registry lock while invoking them, which makes the two paths mutually
//! exclusive.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{ContextId, Rank, SubjectId, WindowId};

/// Lifecycle status of a reaction window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    /// Open, awaiting a counter attempt or expiry.
    Waiting,
    /// Counter attempt arbitrated and succeeded.
    ResolvedSuccess,
    /// Counter attempt arbitrated and failed.
    ResolvedFailure,
    /// Deadline passed with no counter attempt.
    Expired,
}

impl WindowStatus {
    /// Returns whether this status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Waiting)
    }

    /// Returns the snake-case name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::ResolvedSuccess => "resolved_success",
            Self::ResolvedFailure => "resolved_failure",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open opportunity for a subject to answer an attack.
#[derive(Debug)]
pub struct ReactionWindow {
    id: WindowId,
    subject_id: SubjectId,
    context_id: ContextId,
    rank: Rank,
    attack: String,
    started_at: Instant,
    deadline: Instant,
    status: WindowStatus,
    /// Reminder thresholds already emitted for this window
    reminders_fired: BTreeSet<Duration>,
}

impl ReactionWindow {
    /// Creates a waiting window that closes `window` after `now`.
    #[must_use]
    pub fn new(
        id: WindowId,
        subject_id: SubjectId,
        context_id: ContextId,
        rank: Rank,
        attack: impl Into<String>,
        window: Duration,
        now: Instant,
    ) -> Self {
        Self {
            id,
            subject_id,
            context_id,
            rank,
            attack: attack.into(),
            started_at: now,
            deadline: now + window,
            status: WindowStatus::Waiting,
            reminders_fired: BTreeSet::new(),
        }
    }

    /// Window id.
    #[must_use]
    pub const fn id(&self) -> &WindowId {
        &self.id
    }

    /// Defending subject.
    #[must_use]
    pub const fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    /// Routing context.
    #[must_use]
    pub const fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Rank captured when the window opened.
    #[must_use]
    pub const fn rank(&self) -> &Rank {
        &self.rank
    }

    /// Attack summary.
    #[must_use]
    pub fn attack(&self) -> &str {
        &self.attack
    }

    /// Instant the window opened.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Instant the window closes.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> WindowStatus {
        self.status
    }

    /// Total length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.deadline.saturating_duration_since(self.started_at)
    }

    /// Time since the window opened.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Fraction of the window used at `now`, clamped to `[0, 1]`.
    ///
    /// A zero-length window is always fully used.
    #[must_use]
    pub fn elapsed_ratio(&self, now: Instant) -> f64 {
        let total = self.duration();
        if total.is_zero() {
            return 1.0;
        }
        (self.elapsed(now).as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Returns whether the deadline has been reached.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Moves a waiting window to its arbitrated outcome.
    ///
    /// Returns `false` if the window already left `Waiting`.
    pub fn resolve(&mut self, success: bool) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = if success {
            WindowStatus::ResolvedSuccess
        } else {
            WindowStatus::ResolvedFailure
        };
        true
    }

    /// Expires a waiting window whose deadline has passed.
    ///
    /// Returns `false` if the window is terminal or not yet due.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.status.is_terminal() || !self.is_due(now) {
            return false;
        }
        self.status = WindowStatus::Expired;
        true
    }

    /// Records and returns the reminder thresholds crossed by `now`.
    ///
    /// Thresholds are visited longest first, so a tick that skips past
    /// several thresholds still reports each one once, in descending order.
    /// Thresholds at least as long as the whole window never fire.
    pub fn take_due_reminders(&mut self, now: Instant, thresholds: &[Duration]) -> Vec<Duration> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        let total = self.duration();
        let remaining = self.remaining(now);

        let mut ordered: Vec<Duration> = thresholds.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));

        ordered
            .into_iter()
            .filter(|t| *t < total && remaining <= *t)
            .filter(|t| self.reminders_fired.insert(*t))
            .collect()
    }

    /// Thresholds already emitted, longest first.
    #[must_use]
    pub fn reminders_fired(&self) -> Vec<Duration> {
        self.reminders_fired.iter().rev().copied().collect()
    }

    /// Returns an owned copy of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            id: self.id.clone(),
            subject_id: self.subject_id.clone(),
            context_id: self.context_id.clone(),
            rank: self.rank.clone(),
            attack: self.attack.clone(),
            started_at: self.started_at,
            deadline: self.deadline,
            status: self.status,
            reminders_fired: self.reminders_fired(),
        }
    }
}

/// Read-only copy of a window, safe to hold without any lock.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    /// Window id
    pub id: WindowId,
    /// Defending subject
    pub subject_id: SubjectId,
    /// Routing context
    pub context_id: ContextId,
    /// Rank at open time
    pub rank: Rank,
    /// Attack summary
    pub attack: String,
    /// Instant the window opened
    pub started_at: Instant,
    /// Instant the window closes
    pub deadline: Instant,
    /// Status when the snapshot was taken
    pub status: WindowStatus,
    /// Reminder thresholds already emitted, longest first
    pub reminders_fired: Vec<Duration>,
}

impl WindowSnapshot {
    /// Total length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.deadline.saturating_duration_since(self.started_at)
    }

    /// Time left before the deadline at `now`.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn window(len: Duration, now: Instant) -> ReactionWindow {
        ReactionWindow::new(
            WindowId::new("atk-1"),
            SubjectId::new("p1"),
            ContextId::new("room"),
            Rank::new("A"),
            "fireball",
            len,
            now,
        )
    }

    #[test]
    fn deadline_is_start_plus_window() {
        let t0 = Instant::now();
        let w = window(secs(30), t0);
        assert_eq!(w.deadline(), t0 + secs(30));
        assert_eq!(w.status(), WindowStatus::Waiting);
    }

    #[test]
    fn elapsed_ratio_is_clamped() {
        let t0 = Instant::now();
        let w = window(secs(30), t0);
        assert!((w.elapsed_ratio(t0 + secs(9)) - 0.3).abs() < 1e-9);
        assert!((w.elapsed_ratio(t0 + secs(90)) - 1.0).abs() < f64::EPSILON);
        assert!(w.elapsed_ratio(t0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_length_window_is_fully_elapsed() {
        let t0 = Instant::now();
        let w = window(Duration::ZERO, t0);
        assert!((w.elapsed_ratio(t0) - 1.0).abs() < f64::EPSILON);
        assert!(w.is_due(t0));
    }

    #[test]
    fn resolve_happens_once() {
        let t0 = Instant::now();
        let mut w = window(secs(30), t0);
        assert!(w.resolve(true));
        assert!(!w.resolve(false));
        assert_eq!(w.status(), WindowStatus::ResolvedSuccess);
    }

    #[test]
    fn expire_requires_deadline() {
        let t0 = Instant::now();
        let mut w = window(secs(30), t0);
        assert!(!w.expire(t0 + secs(29)));
        assert!(w.expire(t0 + secs(30)));
        assert_eq!(w.status(), WindowStatus::Expired);
    }

    #[test]
    fn resolved_window_cannot_expire() {
        let t0 = Instant::now();
        let mut w = window(secs(30), t0);
        assert!(w.resolve(false));
        assert!(!w.expire(t0 + secs(60)));
        assert_eq!(w.status(), WindowStatus::ResolvedFailure);
    }

    #[test]
    fn expired_window_cannot_resolve() {
        let t0 = Instant::now();
        let mut w = window(secs(30), t0);
        assert!(w.expire(t0 + secs(31)));
        assert!(!w.resolve(true));
        assert_eq!(w.status(), WindowStatus::Expired);
    }

    #[test]
    fn reminders_fire_once_each() {
        let t0 = Instant::now();
        let mut w = window(secs(60), t0);
        let thresholds = [secs(30), secs(10), secs(5)];

        assert!(w.take_due_reminders(t0 + secs(20), &thresholds).is_empty());
        assert_eq!(w.take_due_reminders(t0 + secs(31), &thresholds), vec![secs(30)]);
        assert!(w.take_due_reminders(t0 + secs(33), &thresholds).is_empty());
        assert_eq!(w.take_due_reminders(t0 + secs(51), &thresholds), vec![secs(10)]);
        assert_eq!(w.reminders_fired(), vec![secs(30), secs(10)]);
    }

    #[test]
    fn skipped_thresholds_fire_in_descending_order() {
        let t0 = Instant::now();
        let mut w = window(secs(60), t0);
        let thresholds = [secs(5), secs(30), secs(10)];

        let fired = w.take_due_reminders(t0 + secs(57), &thresholds);
        assert_eq!(fired, vec![secs(30), secs(10), secs(5)]);
        assert!(w.take_due_reminders(t0 + secs(59), &thresholds).is_empty());
    }

    #[test]
    fn thresholds_longer_than_window_never_fire() {
        let t0 = Instant::now();
        let mut w = window(secs(8), t0);
        let thresholds = [secs(30), secs(10), secs(5)];

        assert!(w.take_due_reminders(t0, &thresholds).is_empty());
        assert_eq!(w.take_due_reminders(t0 + secs(4), &thresholds), vec![secs(5)]);
    }

    #[test]
    fn terminal_window_emits_no_reminders() {
        let t0 = Instant::now();
        let mut w = window(secs(60), t0);
        w.resolve(true);
        assert!(w.take_due_reminders(t0 + secs(55), &[secs(10)]).is_empty());
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(WindowStatus::ResolvedSuccess.to_string(), "resolved_success");
        assert!(WindowStatus::Expired.is_terminal());
        assert!(!WindowStatus::Waiting.is_terminal());
    }
}
