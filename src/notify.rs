//! Outbound notifications
//!
//! The engine never phrases or delivers messages itself. It hands typed
//! notices to a [`NotificationSink`] and forgets them: no retries, no
//! delivery confirmation. Sink failures are logged and counted at the call
//! site and never affect window state.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::{CounterAttemptResult, TimingTier};
use crate::error::NotifyError;
use crate::observability::EventEmitter;
use crate::observability::events::Event;
use crate::observability::metrics;
use crate::window::{ContextId, Rank, SubjectId, WindowId, WindowSnapshot};

// ============================================================================
// Notice types
// ============================================================================

/// A window was opened against a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowOpened {
    /// Window id
    pub window_id: WindowId,
    /// Routing context
    pub context_id: ContextId,
    /// Defending subject
    pub subject_id: SubjectId,
    /// Rank that selected the window length
    pub rank: Rank,
    /// Attack summary
    pub attack: String,
    /// Time granted to respond
    #[serde(with = "crate::config::duration")]
    pub window: Duration,
}

impl From<&WindowSnapshot> for WindowOpened {
    fn from(snapshot: &WindowSnapshot) -> Self {
        Self {
            window_id: snapshot.id.clone(),
            context_id: snapshot.context_id.clone(),
            subject_id: snapshot.subject_id.clone(),
            rank: snapshot.rank.clone(),
            attack: snapshot.attack.clone(),
            window: snapshot.duration(),
        }
    }
}

/// Remaining time crossed a configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    /// Window id
    pub window_id: WindowId,
    /// Routing context
    pub context_id: ContextId,
    /// Defending subject
    pub subject_id: SubjectId,
    /// Attack summary
    pub attack: String,
    /// Threshold that was crossed
    #[serde(with = "crate::config::duration")]
    pub threshold: Duration,
    /// Whole seconds left when the reminder was produced
    pub seconds_remaining: u64,
}

/// How a window ended, as told to the defender.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerdictOutcome {
    /// No counter arrived in time; the attack lands undefended.
    NoDefense,
    /// A counter was arbitrated and landed.
    Countered {
        /// Timing grade
        tier: TimingTier,
        /// Damage multiplier for the tier
        damage_multiplier: f64,
    },
    /// A counter was arbitrated and missed.
    CounterFailed {
        /// Timing grade
        tier: TimingTier,
    },
}

impl VerdictOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoDefense => "no_defense",
            Self::Countered { .. } => "countered",
            Self::CounterFailed { .. } => "counter_failed",
        }
    }
}

/// Final statement of a window's outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    /// Window id
    pub window_id: WindowId,
    /// Routing context
    pub context_id: ContextId,
    /// Defending subject
    pub subject_id: SubjectId,
    /// Attack summary
    pub attack: String,
    /// Outcome
    #[serde(flatten)]
    pub outcome: VerdictOutcome,
}

impl Verdict {
    /// Default verdict for a window that expired unanswered.
    #[must_use]
    pub fn no_defense(snapshot: &WindowSnapshot) -> Self {
        Self {
            window_id: snapshot.id.clone(),
            context_id: snapshot.context_id.clone(),
            subject_id: snapshot.subject_id.clone(),
            attack: snapshot.attack.clone(),
            outcome: VerdictOutcome::NoDefense,
        }
    }
}

impl From<&CounterAttemptResult> for Verdict {
    fn from(result: &CounterAttemptResult) -> Self {
        let outcome = if result.success {
            VerdictOutcome::Countered {
                tier: result.tier,
                damage_multiplier: result.damage_multiplier,
            }
        } else {
            VerdictOutcome::CounterFailed { tier: result.tier }
        };
        Self {
            window_id: result.window_id.clone(),
            context_id: result.context_id.clone(),
            subject_id: result.subject_id.clone(),
            attack: result.attack.clone(),
            outcome,
        }
    }
}

/// Any notice the engine can emit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Window opened
    Opened(WindowOpened),
    /// Reminder threshold crossed
    Reminder(Reminder),
    /// Window finalized
    Verdict(Verdict),
}

impl Notice {
    /// Window the notice concerns.
    #[must_use]
    pub const fn window_id(&self) -> &WindowId {
        match self {
            Self::Opened(n) => &n.window_id,
            Self::Reminder(n) => &n.window_id,
            Self::Verdict(n) => &n.window_id,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Opened(_) => "opened",
            Self::Reminder(_) => "reminder",
            Self::Verdict(_) => "verdict",
        }
    }
}

// ============================================================================
// Sink trait
// ============================================================================

/// External transport for reminders and verdicts.
///
/// Calls are fire-and-forget from the engine's point of view.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// A window opened. Sinks that only care about reminders and verdicts
    /// can leave this as a no-op.
    async fn notify_opened(&self, _opened: &WindowOpened) -> Result<(), NotifyError> {
        Ok(())
    }

    /// A reminder threshold was crossed.
    async fn notify_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError>;

    /// A window was finalized.
    async fn notify_verdict(&self, verdict: &Verdict) -> Result<(), NotifyError>;
}

/// Routes a notice to the matching sink method.
///
/// # Errors
///
/// Returns whatever the sink reports.
pub async fn deliver(sink: &dyn NotificationSink, notice: &Notice) -> Result<(), NotifyError> {
    match notice {
        Notice::Opened(n) => sink.notify_opened(n).await,
        Notice::Reminder(n) => sink.notify_reminder(n).await,
        Notice::Verdict(n) => sink.notify_verdict(n).await,
    }
}

/// Delivers notices, concurrently across windows and in order within one.
///
/// Once `cancel` fires, no further sink call is started. Failures are
/// logged and counted; they are never returned.
pub async fn dispatch(
    sink: Arc<dyn NotificationSink>,
    notices: Vec<Notice>,
    cancel: CancellationToken,
) {
    let mut groups: Vec<Vec<Notice>> = Vec::new();
    for notice in notices {
        match groups
            .iter_mut()
            .find(|group| group[0].window_id() == notice.window_id())
        {
            Some(group) => group.push(notice),
            None => groups.push(vec![notice]),
        }
    }

    join_all(groups.into_iter().map(|group| {
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();
        async move {
            for notice in group {
                if cancel.is_cancelled() {
                    debug!(window_id = %notice.window_id(), kind = notice.kind(), "engine stopped, dropping notice");
                    return;
                }
                let delivered = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    result = deliver(sink.as_ref(), &notice) => Some(result),
                };
                match delivered {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        warn!(
                            window_id = %notice.window_id(),
                            kind = notice.kind(),
                            error = %e,
                            "notification delivery failed"
                        );
                        metrics::record_notify_failure(notice.kind(), e.kind());
                    }
                    None => return,
                }
            }
        }
    }))
    .await;
}

// ============================================================================
// Built-in sinks
// ============================================================================

/// Sink that writes every notice to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl NotificationSink for TracingSink {
    async fn notify_opened(&self, opened: &WindowOpened) -> Result<(), NotifyError> {
        info!(
            context = %opened.context_id,
            subject = %opened.subject_id,
            rank = %opened.rank,
            window_secs = opened.window.as_secs(),
            attack = %opened.attack,
            "reaction window opened"
        );
        Ok(())
    }

    async fn notify_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        info!(
            context = %reminder.context_id,
            subject = %reminder.subject_id,
            seconds_remaining = reminder.seconds_remaining,
            attack = %reminder.attack,
            "reaction reminder"
        );
        Ok(())
    }

    async fn notify_verdict(&self, verdict: &Verdict) -> Result<(), NotifyError> {
        info!(
            context = %verdict.context_id,
            subject = %verdict.subject_id,
            outcome = verdict.outcome.as_str(),
            attack = %verdict.attack,
            "reaction verdict"
        );
        Ok(())
    }
}

/// Sink that forwards notices over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notice: Notice) -> Result<(), NotifyError> {
        self.tx.send(notice).map_err(|_| NotifyError::ChannelClosed)
    }
}

#[async_trait::async_trait]
impl NotificationSink for ChannelSink {
    async fn notify_opened(&self, opened: &WindowOpened) -> Result<(), NotifyError> {
        self.send(Notice::Opened(opened.clone()))
    }

    async fn notify_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        self.send(Notice::Reminder(reminder.clone()))
    }

    async fn notify_verdict(&self, verdict: &Verdict) -> Result<(), NotifyError> {
        self.send(Notice::Verdict(verdict.clone()))
    }
}

/// Sink that appends notices to a JSONL event stream.
#[derive(Debug)]
pub struct JsonlSink {
    emitter: Arc<EventEmitter>,
}

impl JsonlSink {
    /// Wraps an event emitter.
    #[must_use]
    pub const fn new(emitter: Arc<EventEmitter>) -> Self {
        Self { emitter }
    }
}

#[async_trait::async_trait]
impl NotificationSink for JsonlSink {
    async fn notify_opened(&self, opened: &WindowOpened) -> Result<(), NotifyError> {
        self.emitter.try_emit(Event::window_opened(opened))
    }

    async fn notify_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        self.emitter.try_emit(Event::reminder_sent(reminder))
    }

    async fn notify_verdict(&self, verdict: &Verdict) -> Result<(), NotifyError> {
        self.emitter.try_emit(Event::verdict(verdict))
    }
}
