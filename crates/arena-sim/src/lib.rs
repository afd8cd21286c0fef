//! # Arena Sim
//!
//! Deterministic, tick-driven simulation core for two-team lane battles.
//!
//! This crate provides:
//! - An in-process component store ([`World`])
//! - A uniform-grid spatial hash per match
//! - Closest-enemy search and the combat state machine
//! - Movement with push and walk-around collision resolution
//! - Attack behaviors, special powers, projectiles and crowd control
//! - Tower conversion, base destruction and match lifecycle commands
//! - Static unit, projectile and map registries loaded from RON
//!
//! A host owns a [`Simulation`], feeds it [`Command`]s and calls
//! [`Simulation::tick`] at a fixed interval.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod attack;
pub mod combat;
pub mod commands;
pub mod components;
pub mod config;
pub mod conversion;
pub mod crowd_control;
pub mod destroyer;
pub mod events;
pub mod match_state;
pub mod movement;
pub mod projectile;
pub mod registry;
pub mod simulation;
pub mod spatial_hash;
pub mod spawn;
pub mod store;
pub mod targeting;

#[cfg(test)]
mod testkit;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::attack::{AreaShape, AttackBehavior, AttackOutcome, Behavior, SpecialPower};
    pub use crate::combat::{CombatEvent, CombatState};
    pub use crate::commands::{Command, CommandOutcome, CommandQueue, CommandReceipt, PlayerSetup};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::events::{EventBus, SimEvent};
    pub use crate::match_state::{MatchState, Player};
    pub use crate::movement::movement_order;
    pub use crate::registry::{Map, MapDef, ProjectileStats, Registries, UnitStats};
    pub use crate::simulation::{Simulation, TickContext, TickReport, SCHEDULE};
    pub use crate::spatial_hash::{CellKey, SeenIds, SpatialEntry, SpatialHash};
    pub use crate::spawn::Blueprint;
    pub use crate::store::{Component, World};
    pub use crate::targeting::{closest_enemy, SearchQuery};
}

pub use prelude::*;
