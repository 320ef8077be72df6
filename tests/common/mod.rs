//! Shared integration-test helpers: fixture paths, running the `riposte`
//! binary, and building engines wired to a channel sink.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use riposte::DefenseEngine;
use riposte::config::EngineConfig;
use riposte::notify::{ChannelSink, Notice};
use riposte::window::{ContextId, Rank, RankEntry, SubjectId, WindowId};
use tokio::sync::mpsc::UnboundedReceiver;

/// Absolute path to a file under `tests/fixtures/`.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `riposte` binary to completion with logging silenced.
#[allow(clippy::missing_panics_doc)]
pub fn run_riposte(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_riposte"))
        .args(args)
        .env_remove("RIPOSTE_CONFIG")
        .env_remove("RIPOSTE_LOG_LEVEL")
        .output()
        .expect("failed to run riposte")
}

/// Engine plus the receiving end of its channel sink.
pub fn engine_with(config: &EngineConfig) -> (Arc<DefenseEngine>, UnboundedReceiver<Notice>) {
    let (sink, rx) = ChannelSink::new();
    (Arc::new(DefenseEngine::new(config, Arc::new(sink))), rx)
}

/// Config with two short ranks and a fixed seed.
#[must_use]
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(100),
        reminder_thresholds: vec![Duration::from_secs(2), Duration::from_secs(1)],
        seed: Some(42),
        ranks: vec![
            RankEntry::new("slow", Duration::from_secs(3)),
            RankEntry::new("fast", Duration::from_secs(1)),
        ],
        announce_resolutions: false,
    }
}

/// Opens a window with a caller-chosen id.
#[allow(clippy::missing_panics_doc)]
pub async fn open(engine: &DefenseEngine, id: &str, subject: &str, rank: &str) -> WindowId {
    engine
        .open_with_id(
            WindowId::new(id),
            SubjectId::new(subject),
            ContextId::new("arena"),
            &Rank::new(rank),
            format!("attack on {subject}"),
        )
        .await
        .expect("window opens")
}

/// Drains every notice currently queued.
pub fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
