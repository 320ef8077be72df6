//! `riposte simulate`
//!
//! Opens windows against an in-process engine, optionally answers each one
//! after a fixed delay, lets the monitor finish the rest, and prints a
//! summary of the outcomes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use crate::arbiter::AttemptOutcome;
use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::config::{ConfigLoader, EngineConfig};
use crate::engine::DefenseEngine;
use crate::error::RiposteError;
use crate::notify::{JsonlSink, NotificationSink, TracingSink};
use crate::observability::events::Event;
use crate::observability::EventEmitter;
use crate::window::{ContextId, Rank, SubjectId};

/// Context id used for simulated windows.
const SIMULATION_CONTEXT: &str = "simulation";

/// Outcome counts for a simulation run.
#[derive(Debug, Default, Serialize)]
pub struct SimulationSummary {
    /// Rank every window was opened with
    pub rank: String,
    /// Window length granted
    #[serde(with = "crate::config::duration")]
    pub window: Duration,
    /// Windows opened
    pub opened: usize,
    /// Counters that landed
    pub countered: usize,
    /// Counters that were arbitrated and missed
    pub counter_failed: usize,
    /// Windows that closed without an arbitrated counter
    pub expired: usize,
    /// Arbitrated attempts per timing tier
    pub tiers: BTreeMap<&'static str, usize>,
}

impl SimulationSummary {
    fn record(&mut self, outcome: &AttemptOutcome) {
        if let Some(result) = outcome.result() {
            *self.tiers.entry(result.tier.as_str()).or_default() += 1;
            if result.success {
                self.countered += 1;
            } else {
                self.counter_failed += 1;
            }
        }
    }

    fn render_human(&self) -> String {
        let mut out = format!(
            "rank {} ({}): {} opened, {} countered, {} failed, {} expired\n",
            self.rank,
            humantime::format_duration(self.window),
            self.opened,
            self.countered,
            self.counter_failed,
            self.expired,
        );
        for (tier, count) in &self.tiers {
            out.push_str(&format!("  {tier:<8} {count}\n"));
        }
        out
    }
}

/// Run a simulation.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the events file
/// cannot be created, or the engine rejects an operation.
pub async fn run(args: &SimulateArgs) -> Result<(), RiposteError> {
    let config = match &args.config {
        Some(path) => {
            let loaded = ConfigLoader::with_defaults().load(path)?;
            for warning in &loaded.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            loaded.config
        }
        None => Arc::new(EngineConfig::default()),
    };

    let emitter = match &args.events_file {
        Some(path) => Some(Arc::new(EventEmitter::from_file(path)?)),
        None => None,
    };
    let sink: Arc<dyn NotificationSink> = match &emitter {
        Some(emitter) => Arc::new(JsonlSink::new(Arc::clone(emitter))),
        None => Arc::new(TracingSink),
    };

    let engine = DefenseEngine::new(&config, sink);
    let rank = Rank::new(&args.rank);
    if !engine.ranks().contains(&rank) {
        match engine.ranks().closest(rank.as_str()) {
            Some(hint) => tracing::warn!(rank = %rank, "unknown rank, did you mean '{hint}'?"),
            None => tracing::warn!(rank = %rank, "unknown rank, using the longest window"),
        }
    }

    engine.start()?;
    let summary = simulate(&engine, &rank, args).await;
    engine.shutdown().await;

    let summary = summary?;
    if let Some(emitter) = &emitter {
        emitter.emit(Event::engine_stopped("simulation complete", engine.stats().active));
    }

    match args.format {
        OutputFormat::Human => print!("{}", summary.render_human()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

async fn simulate(
    engine: &DefenseEngine,
    rank: &Rank,
    args: &SimulateArgs,
) -> Result<SimulationSummary, RiposteError> {
    let mut summary = SimulationSummary {
        rank: rank.to_string(),
        window: engine.ranks().duration(rank),
        ..SimulationSummary::default()
    };

    let mut ids = Vec::with_capacity(args.count);
    for i in 0..args.count {
        let id = engine
            .open(
                SubjectId::new(format!("subject-{i}")),
                ContextId::new(SIMULATION_CONTEXT),
                rank,
                format!("simulated attack #{i}"),
            )
            .await?;
        ids.push(id);
    }
    summary.opened = ids.len();

    if let Some(delay) = args.respond_after {
        let outcomes = join_all(ids.iter().map(|id| async move {
            tokio::time::sleep(delay).await;
            engine.attempt_classified(id, &args.counter).await
        }))
        .await;
        for outcome in &outcomes {
            summary.record(outcome);
        }
    }

    // Let the monitor expire whatever was not answered.
    let poll = engine.stats().tick_interval;
    while engine.stats().active > 0 {
        tokio::time::sleep(poll).await;
    }

    summary.expired = summary.opened - summary.countered - summary.counter_failed;
    Ok(summary)
}
