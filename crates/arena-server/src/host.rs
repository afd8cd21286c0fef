//! Fixed-interval tick loop.

use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use arena_common::{MatchId, Team};
use arena_sim::prelude::*;

use crate::config::ServerConfig;
use crate::demo::Director;
use crate::recorder::EventRecorder;

const DEMO_MATCH: MatchId = MatchId::new(1);

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Ticks simulated
    pub ticks: u64,
    /// Winner, if a base fell
    pub winner: Option<Team>,
    /// Events drained from the bus
    pub events: u64,
    /// Events lost to a full bus
    pub dropped_events: u64,
    /// Commands the simulation rejected
    pub rejected: usize,
    /// Entities skipped because of per-entity errors
    pub entity_errors: usize,
}

/// Builds the simulation from config and plays the demo match.
pub fn run(config: &ServerConfig) -> Result<RunSummary> {
    let registries = match &config.data_dir {
        Some(dir) => Registries::load_dir(dir).with_context(|| format!("loading registries from {}", dir.display()))?,
        None => Registries::builtin().context("loading built-in registries")?,
    };
    let mut sim = Simulation::new(registries, config.sim.clone()).context("creating simulation")?;
    let mut recorder = config
        .event_log
        .as_ref()
        .map(|path| EventRecorder::create(path).with_context(|| format!("creating event log {}", path.display())))
        .transpose()?;

    let mut director = Director::new(DEMO_MATCH, config.demo.clone());
    sim.apply(&director.create_match()).context("creating demo match")?;
    info!(map = %config.demo.map, max_ticks = config.max_ticks, "Demo match started");

    let interval = config.sim.tick_interval();
    let mut summary = RunSummary::default();

    while summary.ticks < config.max_ticks {
        let started = Instant::now();

        for command in director.plan(&sim) {
            if let Err(error) = sim.commands().push(command) {
                warn!(%error, "Command queue full");
            }
        }

        let report = sim.tick();
        summary.ticks = report.tick;
        summary.rejected += report.rejected;
        summary.entity_errors += report.entity_errors;

        for receipt in sim.take_receipts() {
            if let Err(error) = &receipt.result {
                debug!(command = ?receipt.command, %error, "Command rejected");
            }
        }

        let events = sim.events().drain();
        for event in &events {
            log_event(event);
        }
        summary.events += events.len() as u64;
        if let Some(recorder) = recorder.as_mut() {
            recorder.record(report.tick, &events).context("writing event log")?;
        }

        if sim.match_state(DEMO_MATCH).map_or(true, MatchState::is_over) {
            break;
        }

        if config.realtime {
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        recorder.flush().context("flushing event log")?;
        info!(written = recorder.written(), "Event log closed");
    }

    summary.winner = sim.match_state(DEMO_MATCH).and_then(|s| s.winner);
    summary.dropped_events = sim.events().dropped();
    info!(
        ticks = summary.ticks,
        winner = ?summary.winner,
        blue_deployed = director.deployed(Team::Blue),
        red_deployed = director.deployed(Team::Red),
        "Demo match finished"
    );
    Ok(summary)
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::MatchEnded { match_id, winner } => info!(%match_id, ?winner, "Base destroyed"),
        SimEvent::TowerConverted { entity, team, .. } => info!(?entity, ?team, "Tower converted"),
        SimEvent::TowerRestored { entity, .. } => info!(?entity, "Tower restored"),
        SimEvent::UnitSpawned { name, team, uid, .. } => debug!(%name, ?team, %uid, "Unit spawned"),
        other => debug!(event = ?other),
    }
}
