//! # Arena Server
//!
//! Headless host for the arena simulation. Loads `arena.toml` (or the path
//! given as the first argument), plays a scripted match between two demo
//! players and ticks the simulation at the configured interval.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod demo;
mod host;
mod recorder;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::ServerConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("arena=info".parse()?))
        .init();

    info!("Arena server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.as_slice() {
        [cmd] if cmd == "init" => {
            ServerConfig::default().save_to(config::CONFIG_FILE)?;
            return Ok(());
        },
        [cmd, path] if cmd == "init" => {
            ServerConfig::default().save_to(path)?;
            return Ok(());
        },
        [cmd, path] if cmd == "inspect" => return inspect(path),
        [path] => ServerConfig::load_from(path),
        _ => ServerConfig::load(),
    };

    let summary = host::run(&config)?;
    info!(
        ticks = summary.ticks,
        events = summary.events,
        dropped = summary.dropped_events,
        rejected = summary.rejected,
        entity_errors = summary.entity_errors,
        "Arena server shutdown complete"
    );
    Ok(())
}

/// Prints per-kind event counts from a recorded log.
fn inspect(path: &str) -> Result<()> {
    let records = recorder::read_log(path)?;
    let mut counts = std::collections::BTreeMap::new();
    for record in &records {
        *counts.entry(record.event.kind()).or_insert(0u64) += 1;
    }
    let last_tick = records.last().map_or(0, |r| r.tick);
    info!(path, events = records.len(), last_tick, "Event log");
    for (kind, count) in counts {
        info!(kind, count);
    }
    Ok(())
}
