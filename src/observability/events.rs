//! Structured event stream for `Riposte`.
//!
//! Typed window lifecycle events serialized as newline-delimited JSON
//! (JSONL), each stamped with a monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::arbiter::TimingTier;
use crate::error::NotifyError;
use crate::notify::{Reminder, Verdict, VerdictOutcome, WindowOpened};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete window lifecycle event.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A window was opened.
    WindowOpened {
        /// When the event was recorded.
        timestamp: DateTime<Utc>,
        /// Window id.
        window_id: String,
        /// Defending subject.
        subject_id: String,
        /// Routing context.
        context_id: String,
        /// Rank that selected the window length.
        rank: String,
        /// Window length in seconds.
        window_secs: f64,
        /// Attack summary.
        attack: String,
    },

    /// A reminder threshold was crossed.
    ReminderSent {
        /// When the event was recorded.
        timestamp: DateTime<Utc>,
        /// Window id.
        window_id: String,
        /// Defending subject.
        subject_id: String,
        /// Threshold crossed, in seconds.
        threshold_secs: u64,
        /// Whole seconds left.
        seconds_remaining: u64,
    },

    /// A counter attempt resolved a window.
    WindowResolved {
        /// When the event was recorded.
        timestamp: DateTime<Utc>,
        /// Window id.
        window_id: String,
        /// Defending subject.
        subject_id: String,
        /// Timing grade.
        tier: TimingTier,
        /// Whether the counter landed.
        success: bool,
        /// Damage multiplier (zero on failure).
        damage_multiplier: f64,
    },

    /// A window reached its deadline unanswered.
    WindowExpired {
        /// When the event was recorded.
        timestamp: DateTime<Utc>,
        /// Window id.
        window_id: String,
        /// Defending subject.
        subject_id: String,
    },

    /// The engine shut down.
    EngineStopped {
        /// When the event was recorded.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
        /// Windows still open at shutdown.
        open_windows: usize,
    },
}

impl Event {
    /// Event for an opened window.
    #[must_use]
    pub fn window_opened(opened: &WindowOpened) -> Self {
        Self::WindowOpened {
            timestamp: Utc::now(),
            window_id: opened.window_id.to_string(),
            subject_id: opened.subject_id.to_string(),
            context_id: opened.context_id.to_string(),
            rank: opened.rank.to_string(),
            window_secs: opened.window.as_secs_f64(),
            attack: opened.attack.clone(),
        }
    }

    /// Event for a reminder.
    #[must_use]
    pub fn reminder_sent(reminder: &Reminder) -> Self {
        Self::ReminderSent {
            timestamp: Utc::now(),
            window_id: reminder.window_id.to_string(),
            subject_id: reminder.subject_id.to_string(),
            threshold_secs: reminder.threshold.as_secs(),
            seconds_remaining: reminder.seconds_remaining,
        }
    }

    /// Event for a verdict: expired or resolved depending on the outcome.
    #[must_use]
    pub fn verdict(verdict: &Verdict) -> Self {
        let timestamp = Utc::now();
        let window_id = verdict.window_id.to_string();
        let subject_id = verdict.subject_id.to_string();
        match verdict.outcome {
            VerdictOutcome::NoDefense => Self::WindowExpired {
                timestamp,
                window_id,
                subject_id,
            },
            VerdictOutcome::Countered {
                tier,
                damage_multiplier,
            } => Self::WindowResolved {
                timestamp,
                window_id,
                subject_id,
                tier,
                success: true,
                damage_multiplier,
            },
            VerdictOutcome::CounterFailed { tier } => Self::WindowResolved {
                timestamp,
                window_id,
                subject_id,
                tier,
                success: false,
                damage_multiplier: 0.0,
            },
        }
    }

    /// Event for engine shutdown.
    #[must_use]
    pub fn engine_stopped(reason: impl Into<String>, open_windows: usize) -> Self {
        Self::EngineStopped {
            timestamp: Utc::now(),
            reason: reason.into(),
            open_windows,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each event takes the next sequence number, is written as one JSON line,
/// and the writer is flushed.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event, reporting serialization or I/O failures.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Json`] or [`NotifyError::Io`].
    pub fn try_emit(&self, event: Event) -> Result<(), NotifyError> {
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Sequence is taken under the writer lock so lines stay in order.
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&EventEnvelope { sequence, event })?;
        writeln!(w, "{line}")?;
        w.flush()?;
        Ok(())
    }

    /// Emits an event, dropping any failure.
    pub fn emit(&self, event: Event) {
        if let Err(e) = self.try_emit(event) {
            tracing::debug!(error = %e, "event emission failed");
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
