//! Window monitor
//!
//! A periodic sweep over open windows. Each sweep expires windows whose
//! deadline has passed and produces reminders for thresholds crossed since
//! the previous sweep. Notices are handed to the sink only after every
//! window lock has been released.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::notify::{self, NotificationSink, Notice, Reminder, Verdict};
use crate::observability::metrics;
use crate::window::WindowRegistry;
use crate::window::registry::lock;

/// Shortest period the sweep loop runs at.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Periodic expiry and reminder sweep.
pub struct WindowMonitor {
    registry: Arc<WindowRegistry>,
    sink: Arc<dyn NotificationSink>,
    /// Longest first
    thresholds: Vec<Duration>,
    tick_interval: Duration,
    /// Cancels deliveries; its cancellation also stops the sweep loop
    cancel: CancellationToken,
    /// Stops only the sweep loop
    stop: CancellationToken,
    deliveries: TaskTracker,
}

impl std::fmt::Debug for WindowMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowMonitor")
            .field("thresholds", &self.thresholds)
            .field("tick_interval", &self.tick_interval)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl WindowMonitor {
    /// Creates a monitor over `registry`.
    ///
    /// Thresholds may be given in any order. A tick interval below
    /// [`MIN_TICK_INTERVAL`] is raised to it.
    #[must_use]
    pub fn new(
        registry: Arc<WindowRegistry>,
        sink: Arc<dyn NotificationSink>,
        tick_interval: Duration,
        mut thresholds: Vec<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        if tick_interval < MIN_TICK_INTERVAL {
            warn!(
                requested_ms = tick_interval.as_millis(),
                min_ms = MIN_TICK_INTERVAL.as_millis(),
                "tick interval too short, using minimum"
            );
        }
        let tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        Self {
            registry,
            sink,
            thresholds,
            tick_interval,
            stop: cancel.child_token(),
            cancel,
            deliveries: TaskTracker::new(),
        }
    }

    /// Configured thresholds, longest first.
    #[must_use]
    pub fn thresholds(&self) -> &[Duration] {
        &self.thresholds
    }

    /// Time between sweeps.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Sweeps every open window at `now` and returns the resulting notices.
    ///
    /// Reminders are taken before the expiry check, so thresholds a window
    /// skipped on its way past the deadline still fire once, ahead of its
    /// verdict. Expired windows are removed from the registry before this
    /// returns. No sink is called.
    pub fn sweep_at(&self, now: Instant) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut expired = 0usize;

        for handle in self.registry.handles() {
            let mut window = lock(&handle);

            let fired = window.take_due_reminders(now, &self.thresholds);
            if !fired.is_empty() {
                let seconds_remaining = window.remaining(now).as_secs();
                for threshold in fired {
                    debug!(
                        window_id = %window.id(),
                        threshold_secs = threshold.as_secs(),
                        seconds_remaining,
                        "reminder threshold crossed"
                    );
                    metrics::record_reminder(threshold);
                    notices.push(Notice::Reminder(Reminder {
                        window_id: window.id().clone(),
                        context_id: window.context_id().clone(),
                        subject_id: window.subject_id().clone(),
                        attack: window.attack().to_string(),
                        threshold,
                        seconds_remaining,
                    }));
                }
            }

            if window.expire(now) {
                let snapshot = window.snapshot();
                drop(window);
                self.registry.remove_handle(&snapshot.id, &handle);
                expired += 1;
                metrics::record_window_expired();
                info!(
                    window_id = %snapshot.id,
                    subject = %snapshot.subject_id,
                    context = %snapshot.context_id,
                    "window expired without a counter"
                );
                notices.push(Notice::Verdict(Verdict::no_defense(&snapshot)));
            }
        }

        if expired > 0 {
            metrics::set_windows_active(self.registry.len());
        }
        notices
    }

    /// Sweeps at `now` and delivers the notices before returning.
    ///
    /// Returns how many notices the sweep produced. Once the cancellation
    /// token has fired nothing is swept, since the verdicts could no longer
    /// be delivered.
    pub async fn tick_at(&self, now: Instant) -> usize {
        if self.cancel.is_cancelled() {
            debug!("monitor cancelled, skipping sweep");
            return 0;
        }
        let notices = self.sweep_at(now);
        let produced = notices.len();
        if produced > 0 {
            notify::dispatch(Arc::clone(&self.sink), notices, self.cancel.clone()).await;
        }
        produced
    }

    /// Sweeps at the current time and delivers the notices.
    pub async fn tick(&self) -> usize {
        self.tick_at(Instant::now()).await
    }

    /// Spawns the periodic sweep task.
    ///
    /// Deliveries run on their own tasks so a slow sink never delays the
    /// next sweep. The task exits on [`stop`](Self::stop) or when the
    /// cancellation token fires.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.tick_interval);
            loop {
                tokio::select! {
                    () = monitor.stop.cancelled() => {
                        debug!("window monitor cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let notices = monitor.sweep_at(Instant::now());
                        if !notices.is_empty() {
                            monitor.deliveries.spawn(notify::dispatch(
                                Arc::clone(&monitor.sink),
                                notices,
                                monitor.cancel.clone(),
                            ));
                        }
                    }
                }
            }
            monitor.deliveries.close();
        })
    }

    /// Stops the sweep loop, leaving in-flight deliveries running.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Waits for in-flight deliveries after the sweep task has stopped.
    pub async fn drained(&self) {
        self.deliveries.close();
        self.deliveries.wait().await;
    }
}
