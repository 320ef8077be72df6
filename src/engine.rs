//! Defense engine facade
//!
//! [`DefenseEngine`] wires the registry, arbiter, monitor, sink and
//! precision classifier together behind the operations callers use: open
//! a window, submit a counter, inspect windows, run the monitor, shut down.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::{
    Arbiter, AttemptOutcome, KeywordClassifier, PrecisionClassifier, PrecisionSignal,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::monitor::WindowMonitor;
use crate::notify::{self, NotificationSink, Notice, Verdict, WindowOpened};
use crate::observability::metrics;
use crate::window::{
    ContextId, Rank, RankDurationTable, ReactionWindow, SubjectId, WindowId, WindowRegistry,
    WindowSnapshot, WindowStatus,
};

/// How long shutdown waits for in-flight notice deliveries.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Point-in-time engine figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Windows currently open
    pub active: usize,
    /// Monitor tick
    #[serde(with = "crate::config::duration")]
    pub tick_interval: Duration,
    /// Number of ranks in the table
    pub ranks: usize,
}

/// Timed defense window engine.
pub struct DefenseEngine {
    registry: Arc<WindowRegistry>,
    arbiter: Arbiter,
    monitor: Arc<WindowMonitor>,
    ranks: RankDurationTable,
    sink: Arc<dyn NotificationSink>,
    classifier: Arc<dyn PrecisionClassifier>,
    announce_resolutions: bool,
    cancel: CancellationToken,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DefenseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefenseEngine")
            .field("active", &self.registry.len())
            .field("monitor", &self.monitor)
            .field("announce_resolutions", &self.announce_resolutions)
            .finish_non_exhaustive()
    }
}

impl DefenseEngine {
    /// Creates an engine from configuration.
    ///
    /// The monitor is not running until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(config: &EngineConfig, sink: Arc<dyn NotificationSink>) -> Self {
        let registry = Arc::new(WindowRegistry::new());
        let cancel = CancellationToken::new();
        let arbiter = match config.seed {
            Some(seed) => Arbiter::seeded(Arc::clone(&registry), seed),
            None => Arbiter::new(Arc::clone(&registry)),
        };
        let monitor = Arc::new(WindowMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&sink),
            config.tick_interval,
            config.sorted_thresholds(),
            cancel.clone(),
        ));

        Self {
            registry,
            arbiter,
            monitor,
            ranks: config.rank_table(),
            sink,
            classifier: Arc::new(KeywordClassifier::new()),
            announce_resolutions: config.announce_resolutions,
            cancel,
            monitor_task: Mutex::new(None),
        }
    }

    /// Replaces the precision classifier used by
    /// [`attempt_classified`](Self::attempt_classified).
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn PrecisionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Opens a window under a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotRunning`] after shutdown.
    pub async fn open(
        &self,
        subject: SubjectId,
        context: ContextId,
        rank: &Rank,
        attack: impl Into<String>,
    ) -> Result<WindowId, EngineError> {
        self.open_with_id(WindowId::generate(), subject, context, rank, attack)
            .await
    }

    /// Opens a window under a caller-chosen id.
    ///
    /// The window length comes from the rank table; unknown ranks get the
    /// longest window.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateWindowId`] if `id` is already open,
    /// or [`EngineError::NotRunning`] after shutdown.
    pub async fn open_with_id(
        &self,
        id: WindowId,
        subject: SubjectId,
        context: ContextId,
        rank: &Rank,
        attack: impl Into<String>,
    ) -> Result<WindowId, EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::NotRunning("engine has shut down".into()));
        }

        let window = self.ranks.duration(rank);
        let snapshot = self.registry.open(ReactionWindow::new(
            id,
            subject,
            context,
            rank.clone(),
            attack,
            window,
            Instant::now(),
        ))?;

        metrics::record_window_opened(rank.as_str(), self.ranks.contains(rank));
        metrics::set_windows_active(self.registry.len());
        debug!(
            window_id = %snapshot.id,
            subject = %snapshot.subject_id,
            rank = %rank,
            window_ms = window.as_millis(),
            "reaction window opened"
        );

        let id = snapshot.id.clone();
        self.deliver(Notice::Opened(WindowOpened::from(&snapshot)))
            .await;
        Ok(id)
    }

    /// Arbitrates a counter attempt with a caller-supplied precision signal.
    ///
    /// Returns [`AttemptOutcome::WindowNotFound`] when the window was
    /// already resolved or expired, or never existed.
    pub async fn attempt(
        &self,
        id: &WindowId,
        counter: &str,
        precision: Option<PrecisionSignal>,
    ) -> AttemptOutcome {
        let outcome = self.arbiter.attempt(id, counter, precision);
        if self.announce_resolutions {
            if let Some(result) = outcome.result() {
                self.deliver(Notice::Verdict(Verdict::from(result))).await;
            }
        }
        outcome
    }

    /// Classifies `counter` with the configured classifier, then arbitrates.
    pub async fn attempt_classified(&self, id: &WindowId, counter: &str) -> AttemptOutcome {
        let precision = self.classifier.classify(counter);
        self.attempt(id, counter, Some(precision)).await
    }

    /// Status of window `id`, or `None` if it is not open.
    ///
    /// Windows leave the registry as soon as they reach a terminal state,
    /// so a terminal status is only ever observed mid-transition.
    #[must_use]
    pub fn status(&self, id: &WindowId) -> Option<WindowStatus> {
        self.registry.get(id).map(|snapshot| snapshot.status)
    }

    /// Snapshot of window `id`.
    #[must_use]
    pub fn window(&self, id: &WindowId) -> Option<WindowSnapshot> {
        self.registry.get(id)
    }

    /// Snapshots of all open windows, soonest deadline first.
    #[must_use]
    pub fn active_windows(&self) -> Vec<WindowSnapshot> {
        let mut windows = self.registry.all();
        windows.sort_by_key(|w| w.deadline);
        windows
    }

    /// The waiting window for `subject` that closes soonest.
    #[must_use]
    pub fn find_by_subject(&self, subject: &SubjectId) -> Option<WindowSnapshot> {
        self.registry.find_by_subject(subject)
    }

    /// Current engine figures.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            active: self.registry.len(),
            tick_interval: self.monitor.tick_interval(),
            ranks: self.ranks.entries().len(),
        }
    }

    /// Rank table in use.
    #[must_use]
    pub const fn ranks(&self) -> &RankDurationTable {
        &self.ranks
    }

    /// Starts the background monitor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotRunning`] if the monitor is already
    /// running or the engine has shut down.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::NotRunning("engine has shut down".into()));
        }
        let mut task = self
            .monitor_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(EngineError::NotRunning("monitor already started".into()));
        }
        *task = Some(self.monitor.start());
        info!(
            tick_ms = self.monitor.tick_interval().as_millis(),
            thresholds = self.monitor.thresholds().len(),
            "window monitor started"
        );
        Ok(())
    }

    /// Runs one monitor sweep now and delivers its notices.
    ///
    /// Returns how many notices were produced. After shutdown this sweeps
    /// nothing and returns 0.
    pub async fn tick(&self) -> usize {
        self.monitor.tick().await
    }

    /// Stops the monitor and shuts the engine down.
    ///
    /// Deliveries already handed off by the monitor get
    /// [`SHUTDOWN_GRACE`] to finish; anything still pending after that is
    /// dropped. Open windows stay in the registry but are no longer swept.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.monitor.stop();

        let task = self
            .monitor_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "window monitor task failed");
            }
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, self.monitor.drained())
            .await
            .is_err()
        {
            warn!("notification deliveries still pending at shutdown, dropping them");
        }
        self.cancel.cancel();
        info!(open_windows = self.registry.len(), "defense engine stopped");
    }

    /// Returns whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Delivers one engine-originated notice unless shut down.
    async fn deliver(&self, notice: Notice) {
        notify::dispatch(Arc::clone(&self.sink), vec![notice], self.cancel.clone()).await;
    }
}
