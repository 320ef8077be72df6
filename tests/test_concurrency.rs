//! Races between counter attempts and the monitor's expiry sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use riposte::arbiter::Arbiter;
use riposte::monitor::WindowMonitor;
use riposte::notify::{ChannelSink, Notice};
use riposte::window::{ContextId, Rank, ReactionWindow, SubjectId, WindowId, WindowRegistry};
use tokio::sync::Barrier;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn open(registry: &WindowRegistry, id: &str, len: Duration, now: Instant) {
    registry
        .open(ReactionWindow::new(
            WindowId::new(id),
            SubjectId::new("p1"),
            ContextId::new("arena"),
            Rank::new("A"),
            "slash",
            len,
            now,
        ))
        .unwrap();
}

fn monitor(registry: &Arc<WindowRegistry>) -> Arc<WindowMonitor> {
    let (sink, _rx) = ChannelSink::new();
    Arc::new(WindowMonitor::new(
        Arc::clone(registry),
        Arc::new(sink),
        Duration::from_millis(10),
        Vec::new(),
        CancellationToken::new(),
    ))
}

fn verdicts(notices: &[Notice]) -> usize {
    notices
        .iter()
        .filter(|n| matches!(n, Notice::Verdict(_)))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn attempt_and_expiry_at_deadline_resolve_once() {
    for round in 0..50u64 {
        let registry = Arc::new(WindowRegistry::new());
        let arbiter = Arc::new(Arbiter::seeded(Arc::clone(&registry), round));
        let monitor = monitor(&registry);
        let t0 = Instant::now();
        open(&registry, "w", Duration::from_secs(10), t0);
        let deadline = t0 + Duration::from_secs(10);

        let barrier = Arc::new(Barrier::new(16));
        let resolved = Arc::new(AtomicUsize::new(0));
        let expired = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let (barrier, arbiter, resolved) =
                (Arc::clone(&barrier), Arc::clone(&arbiter), Arc::clone(&resolved));
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                let outcome = arbiter.attempt_at(&WindowId::new("w"), "dodge", None, deadline, 0.0);
                if outcome.is_resolved() {
                    resolved.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for _ in 0..8 {
            let (barrier, monitor, expired) =
                (Arc::clone(&barrier), Arc::clone(&monitor), Arc::clone(&expired));
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                let notices = monitor.sweep_at(deadline);
                expired.fetch_add(verdicts(&notices), Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(
            resolved.load(Ordering::SeqCst) + expired.load(Ordering::SeqCst),
            1,
            "round {round}: window must reach exactly one terminal outcome"
        );
        assert!(registry.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_windows_each_resolve_once() {
    const WINDOWS: usize = 200;
    let registry = Arc::new(WindowRegistry::new());
    let arbiter = Arc::new(Arbiter::seeded(Arc::clone(&registry), 9));
    let monitor = monitor(&registry);
    let t0 = Instant::now();
    for i in 0..WINDOWS {
        open(&registry, &format!("w{i}"), Duration::from_secs(10), t0);
    }
    // Half the attempts land before the deadline, half race the sweep.
    let at = |i: usize| {
        if i % 2 == 0 {
            t0 + Duration::from_secs(3)
        } else {
            t0 + Duration::from_secs(10)
        }
    };

    let resolved = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for i in 0..WINDOWS {
        let (arbiter, resolved) = (Arc::clone(&arbiter), Arc::clone(&resolved));
        let now = at(i);
        tasks.push(tokio::spawn(async move {
            for _ in 0..3 {
                if arbiter
                    .attempt_at(&WindowId::new(format!("w{i}")), "parry", None, now, 0.5)
                    .is_resolved()
                {
                    resolved.fetch_add(1, Ordering::SeqCst);
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    let sweeper = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            let mut expired = 0;
            for _ in 0..20 {
                expired += verdicts(&monitor.sweep_at(t0 + Duration::from_secs(10)));
                tokio::task::yield_now().await;
            }
            expired
        })
    };

    for task in tasks {
        task.await.unwrap();
    }
    let mut expired = sweeper.await.unwrap();
    // Anything still open missed every racing sweep; finish it now.
    expired += verdicts(&monitor.sweep_at(t0 + Duration::from_secs(10)));

    assert_eq!(resolved.load(Ordering::SeqCst) + expired, WINDOWS);
    assert!(registry.is_empty());
}
