mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain, engine_with, open};
use riposte::DefenseEngine;
use riposte::arbiter::{AttemptOutcome, TimingTier};
use riposte::config::EngineConfig;
use riposte::error::NotifyError;
use riposte::notify::{NotificationSink, Notice, Reminder, Verdict, VerdictOutcome};
use riposte::window::{SubjectId, WindowId, WindowStatus};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn notices_for<'a>(notices: &'a [Notice], id: &WindowId) -> Vec<&'a Notice> {
    notices.iter().filter(|n| n.window_id() == id).collect()
}

#[tokio::test(start_paused = true)]
async fn rank_a_scenario() {
    let (engine, mut rx) = engine_with(&EngineConfig::default());
    engine.start().unwrap();

    let answered = open(&engine, "atk-1", "p1", "A").await;
    let ignored = open(&engine, "atk-2", "p2", "A").await;

    tokio::time::sleep(secs(9)).await;
    let result = engine
        .attempt(&answered, "parry high", None)
        .await
        .into_result()
        .expect("window still open at 9s");
    assert_eq!(result.tier, TimingTier::Good);
    assert!((result.elapsed_ratio - 0.3).abs() < 1e-3);
    assert!((result.damage_multiplier - 1.8).abs() < f64::EPSILON);
    assert!((result.success_rate - 0.85).abs() < f64::EPSILON);
    assert_eq!(engine.status(&answered), None);

    assert_eq!(
        engine.attempt(&answered, "parry again", None).await,
        AttemptOutcome::WindowNotFound
    );

    tokio::time::sleep(secs(24)).await;
    assert_eq!(engine.status(&ignored), None);
    assert_eq!(engine.stats().active, 0);

    let notices = drain(&mut rx);

    // The answered window only ever saw its opening notice.
    let first = notices_for(&notices, &answered);
    assert_eq!(first.len(), 1);
    assert!(matches!(first[0], Notice::Opened(_)));

    // The ignored one got the 10s and 5s reminders (30s is the whole
    // window), then the default verdict.
    let second = notices_for(&notices, &ignored);
    let thresholds: Vec<u64> = second
        .iter()
        .filter_map(|n| match n {
            Notice::Reminder(r) => Some(r.threshold.as_secs()),
            _ => None,
        })
        .collect();
    assert_eq!(thresholds, [10, 5]);
    match second.last() {
        Some(Notice::Verdict(v)) => {
            assert_eq!(v.outcome, VerdictOutcome::NoDefense);
            assert_eq!(v.subject_id, SubjectId::new("p2"));
        }
        other => panic!("expected verdict last, got {other:?}"),
    }

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn window_does_not_expire_early() {
    let (engine, mut rx) = engine_with(&EngineConfig::default());
    engine.start().unwrap();
    let id = open(&engine, "w", "p1", "SSS").await;

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(engine.status(&id), Some(WindowStatus::Waiting));

    tokio::time::sleep(secs(2)).await;
    assert_eq!(engine.status(&id), None);
    assert!(
        drain(&mut rx)
            .iter()
            .any(|n| matches!(n, Notice::Verdict(v) if v.window_id == id))
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sweeping() {
    let (engine, mut rx) = engine_with(&EngineConfig::default());
    engine.start().unwrap();
    let id = open(&engine, "w", "p1", "MONARQUE").await;

    engine.shutdown().await;
    tokio::time::sleep(secs(60)).await;

    assert_eq!(engine.status(&id), Some(WindowStatus::Waiting));
    assert!(
        drain(&mut rx)
            .iter()
            .all(|n| matches!(n, Notice::Opened(_)))
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_tick_after_shutdown_keeps_window_open() {
    let (engine, mut rx) = engine_with(&EngineConfig::default());
    let id = open(&engine, "w", "p1", "MONARQUE").await;
    engine.shutdown().await;

    tokio::time::advance(secs(5)).await;
    assert_eq!(engine.tick().await, 0);
    assert_eq!(engine.status(&id), Some(WindowStatus::Waiting));
    assert!(
        drain(&mut rx)
            .iter()
            .all(|n| matches!(n, Notice::Opened(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn manual_tick_without_background_task() {
    let (engine, mut rx) = engine_with(&EngineConfig::default());
    let id = open(&engine, "w", "p1", "MONARQUE").await;
    let _opened = rx.recv().await;

    assert_eq!(engine.tick().await, 0);
    tokio::time::advance(secs(3)).await;
    assert_eq!(engine.tick().await, 1);
    assert!(matches!(rx.recv().await, Some(Notice::Verdict(v)) if v.window_id == id));
}

/// Sink whose transport is always down.
struct BrokenSink;

#[async_trait::async_trait]
impl NotificationSink for BrokenSink {
    async fn notify_reminder(&self, _reminder: &Reminder) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }

    async fn notify_verdict(&self, _verdict: &Verdict) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn sink_failures_do_not_affect_windows() {
    let engine = DefenseEngine::new(&EngineConfig::default(), Arc::new(BrokenSink));
    engine.start().unwrap();
    let id = open(&engine, "w", "p1", "S").await;

    // Wake after the 16s sweep, not on it.
    tokio::time::sleep(secs(17)).await;
    assert_eq!(engine.status(&id), None);
    assert_eq!(
        engine.attempt(&id, "too late", None).await,
        AttemptOutcome::WindowNotFound
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn subject_lookup_tracks_soonest_window() {
    let (engine, _rx) = engine_with(&EngineConfig::default());
    open(&engine, "slow", "p1", "G").await;
    open(&engine, "fast", "p1", "SS").await;

    let found = engine.find_by_subject(&SubjectId::new("p1")).unwrap();
    assert_eq!(found.id, WindowId::new("fast"));

    engine.attempt(&found.id, "dodge", None).await;
    let next = engine.find_by_subject(&SubjectId::new("p1")).unwrap();
    assert_eq!(next.id, WindowId::new("slow"));
    assert_eq!(engine.active_windows().len(), 1);
}
