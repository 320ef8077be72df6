#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use riposte::arbiter::TimingTier;
use riposte::window::{ContextId, Rank, ReactionWindow, SubjectId, WindowId};
use tokio::time::Instant;

fuzz_target!(|data: &[u8]| {
    let Some((&len, rest)) = data.split_first() else {
        return;
    };
    let (thresholds, sweeps) = rest.split_at(rest.len() / 2);
    let thresholds: Vec<Duration> = thresholds
        .iter()
        .map(|b| Duration::from_millis(u64::from(*b) * 10))
        .collect();

    let t0 = Instant::now();
    let mut window = ReactionWindow::new(
        WindowId::new("fuzz"),
        SubjectId::new("p"),
        ContextId::new("c"),
        Rank::new("A"),
        "fuzz",
        Duration::from_millis(u64::from(len) * 10),
        t0,
    );

    let mut offset = Duration::ZERO;
    let mut fired = Vec::new();
    for step in sweeps {
        offset += Duration::from_millis(u64::from(*step));
        let now = t0 + offset;
        let _ = TimingTier::classify(window.elapsed_ratio(now));
        fired.extend(window.take_due_reminders(now, &thresholds));
        if window.expire(now) {
            break;
        }
    }

    assert!(fired.windows(2).all(|p| p[0] > p[1]));
});
