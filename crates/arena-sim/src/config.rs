//! Simulation tuning.
//!
//! Numbers the systems consult every tick but that are not part of any unit
//! or map definition. Every field has a default so a partial config file
//! only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use arena_common::ConfigError;

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Scheduling ===
    /// Wall-clock length of one tick in milliseconds
    pub tick_interval_ms: u64,

    // === Spatial Index ===
    /// Edge length of a spatial-hash cell
    pub cell_size: f32,

    // === Combat ===
    /// Slack added to attack radii in range checks
    pub range_tolerance: f32,

    // === Movement ===
    /// Gap kept between bodies when approaching a target
    pub approach_margin: f32,
    /// Angle between walk-around probes, in degrees
    pub walk_around_step_deg: f32,
    /// Probes tried on each side before giving up
    pub walk_around_steps: u32,

    // === Economy ===
    /// Gold each player starts with
    pub gold_start: f32,
    /// Gold added per tick
    pub gold_regen: f32,
    /// Gold ceiling
    pub gold_cap: f32,
    /// Cards held in hand
    pub hand_size: usize,

    // === Structures ===
    /// Health restored per tick to a converting tower
    pub conversion_heal_rate: f32,

    // === Queues ===
    /// Capacity of the inbound command queue
    pub command_capacity: usize,
    /// Capacity of the outbound event bus
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,

            cell_size: 100.0,

            range_tolerance: 5.0,

            approach_margin: 1.0,
            walk_around_step_deg: 30.0,
            walk_around_steps: 3,

            gold_start: 5.0,
            gold_regen: 0.05,
            gold_cap: 10.0,
            hand_size: 4,

            conversion_heal_rate: 10.0,

            command_capacity: 1024,
            event_capacity: 4096,
        }
    }
}

impl SimConfig {
    /// Tick length as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Checks values the systems cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        let invalid = |reason: &str| ConfigError::InvalidStats {
            name: "sim".to_string(),
            reason: reason.to_string(),
        };
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms must be positive"));
        }
        if self.gold_cap < self.gold_start {
            return Err(invalid("gold_cap is below gold_start"));
        }
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err(invalid("queue capacities must be positive"));
        }
        Ok(())
    }
}
