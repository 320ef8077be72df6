//! Metrics collection for `Riposte`.
//!
//! Prometheus-compatible metrics with label cardinality protection and typed
//! convenience functions. Every `record_*` function is a no-op until
//! [`init_metrics`] installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::RiposteError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Label used for values that are not safe to export verbatim.
pub const UNKNOWN_LABEL: &str = "__unknown__";

/// Maximum length of a rank label.
const MAX_RANK_LABEL_LEN: usize = 32;

/// Sanitizes a rank for use as a metrics label.
///
/// Ranks come from callers, so anything the rank table does not know is
/// bucketed as [`UNKNOWN_LABEL`]. Known ranks are truncated and restricted
/// to Prometheus-safe characters.
#[must_use]
pub fn sanitize_rank_label(rank: &str, known: bool) -> String {
    if !known || rank.is_empty() {
        return UNKNOWN_LABEL.to_owned();
    }
    rank.chars()
        .take(MAX_RANK_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `RiposteError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), RiposteError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| RiposteError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("riposte_windows_opened_total", "Reaction windows opened, by rank");
    describe_counter!(
        "riposte_windows_resolved_total",
        "Windows resolved by a counter attempt, by tier and outcome"
    );
    describe_counter!(
        "riposte_windows_expired_total",
        "Windows that reached their deadline unanswered"
    );
    describe_counter!("riposte_reminders_total", "Reminders produced, by threshold");
    describe_counter!(
        "riposte_notify_failures_total",
        "Notification deliveries that failed, by notice and error kind"
    );
    describe_gauge!("riposte_windows_active", "Windows currently waiting");
    describe_histogram!(
        "riposte_reaction_ratio",
        "Fraction of the window used by resolving counter attempts"
    );
}

/// Records a window being opened.
pub fn record_window_opened(rank: &str, known: bool) {
    counter!("riposte_windows_opened_total", "rank" => sanitize_rank_label(rank, known))
        .increment(1);
}

/// Records a window resolved by a counter attempt.
pub fn record_window_resolved(tier: &'static str, success: bool, ratio: f64) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "riposte_windows_resolved_total",
        "tier" => tier,
        "outcome" => outcome,
    )
    .increment(1);
    histogram!("riposte_reaction_ratio").record(ratio);
}

/// Records a window expiring without a counter.
pub fn record_window_expired() {
    counter!("riposte_windows_expired_total").increment(1);
}

/// Records a reminder for the given threshold.
pub fn record_reminder(threshold: Duration) {
    counter!(
        "riposte_reminders_total",
        "threshold" => format!("{}s", threshold.as_secs())
    )
    .increment(1);
}

/// Records a failed notification delivery.
pub fn record_notify_failure(notice: &'static str, kind: &'static str) {
    counter!(
        "riposte_notify_failures_total",
        "notice" => notice,
        "kind" => kind,
    )
    .increment(1);
}

/// Sets the number of windows currently stored.
#[allow(clippy::cast_precision_loss)]
pub fn set_windows_active(count: usize) {
    gauge!("riposte_windows_active").set(count as f64);
}
