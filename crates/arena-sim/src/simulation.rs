//! Tick driver.
//!
//! [`Simulation`] owns the store, the per-match records and the static data.
//! Each [`Simulation::tick`] drains the command queue, then runs the system
//! schedule once per live match in match-id order. Systems see one match at
//! a time through a [`TickContext`].

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use arena_common::{ArenaError, ArenaResult, EntityId, MatchId};

use crate::combat;
use crate::commands::{self, Command, CommandQueue, CommandReceipt};
use crate::components::{Body, Effect};
use crate::config::SimConfig;
use crate::conversion;
use crate::crowd_control;
use crate::destroyer;
use crate::events::EventBus;
use crate::match_state::MatchState;
use crate::movement;
use crate::projectile;
use crate::registry::{Map, Registries};
use crate::store::{Component, World};
use crate::targeting;

/// A system run once per match per tick.
pub type System = fn(&mut TickContext<'_>);

/// Systems in the order they run each tick.
pub const SCHEDULE: &[(&str, System)] = &[
    ("economy", regenerate_gold),
    ("movement", movement::run),
    ("targeting", targeting::run),
    ("effects", crowd_control::run),
    ("projectiles", projectile::run),
    ("attack", combat::run),
    ("conversion", conversion::run),
    ("destroyer", destroyer::run),
];

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number just completed
    pub tick: u64,
    /// Matches simulated
    pub matches: usize,
    /// Commands applied
    pub commands: usize,
    /// Commands rejected
    pub rejected: usize,
    /// Entities skipped because of an error
    pub entity_errors: usize,
}

/// One match's view of the simulation during a tick.
pub struct TickContext<'a> {
    /// Component store
    pub world: &'a mut World,
    /// Match being simulated
    pub state: &'a mut MatchState,
    /// The match's map
    pub map: &'a Map,
    /// Static data
    pub registries: &'a Registries,
    /// Tuning
    pub config: &'a SimConfig,
    /// Outbound events
    pub events: &'a EventBus,
    /// Counters for this tick
    pub report: &'a mut TickReport,
}

impl TickContext<'_> {
    /// Match being simulated.
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.state.id
    }

    /// Ids of this match's entities carrying `T`, in ascending order.
    #[must_use]
    pub fn members<T: Component>(&self) -> Vec<EntityId> {
        let id = self.state.id;
        self.world
            .iter::<T>()
            .map(|(e, _)| e)
            .filter(|e| self.world.get_ref::<Body>(*e).is_ok_and(|b| b.match_id == id))
            .collect()
    }

    /// Ids of this match's timed effects, in ascending order.
    #[must_use]
    pub fn effects(&self) -> Vec<EntityId> {
        let id = self.state.id;
        self.world
            .iter::<Effect>()
            .filter(|(_, e)| e.match_id == id)
            .map(|(e, _)| e)
            .collect()
    }

    /// Logs a per-entity failure and counts it. The tick carries on.
    pub fn skip(&mut self, system: &str, entity: EntityId, error: impl Into<ArenaError>) {
        let error = error.into();
        warn!(system, entity = ?entity, error = %error, "Skipping entity this tick");
        self.report.entity_errors += 1;
    }

    /// Runs `f` for each id, logging and skipping the ones that fail.
    pub fn for_each(
        &mut self,
        system: &str,
        ids: Vec<EntityId>,
        mut f: impl FnMut(&mut Self, EntityId) -> ArenaResult<()>,
    ) {
        for id in ids {
            if let Err(e) = f(self, id) {
                self.skip(system, id, e);
            }
        }
    }
}

fn regenerate_gold(ctx: &mut TickContext<'_>) {
    let (amount, cap) = (ctx.config.gold_regen, ctx.config.gold_cap);
    for player in &mut ctx.state.players {
        player.regenerate(amount, cap);
    }
}

/// The simulation core.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    matches: BTreeMap<MatchId, MatchState>,
    registries: Registries,
    config: SimConfig,
    commands: CommandQueue,
    events: EventBus,
    receipts: Vec<CommandReceipt>,
    tick: u64,
}

impl Simulation {
    /// Creates a simulation with no matches.
    pub fn new(registries: Registries, config: SimConfig) -> ArenaResult<Self> {
        config.validate()?;
        Ok(Self {
            world: World::new(),
            matches: BTreeMap::new(),
            commands: CommandQueue::new(config.command_capacity),
            events: EventBus::new(config.event_capacity),
            registries,
            config,
            receipts: Vec::new(),
            tick: 0,
        })
    }

    /// Component store.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable component store, for hosts that seed entities directly.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// A match record.
    #[must_use]
    pub fn match_state(&self, id: MatchId) -> Option<&MatchState> {
        self.matches.get(&id)
    }

    /// Mutable match record.
    pub fn match_state_mut(&mut self, id: MatchId) -> Option<&mut MatchState> {
        self.matches.get_mut(&id)
    }

    /// Static data.
    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Tuning.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Inbound command queue.
    #[must_use]
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Outbound event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Ticks completed.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Takes the results of commands applied so far.
    pub fn take_receipts(&mut self) -> Vec<CommandReceipt> {
        std::mem::take(&mut self.receipts)
    }

    /// Applies one command immediately.
    pub fn apply(&mut self, command: &Command) -> ArenaResult<commands::CommandOutcome> {
        commands::apply(
            command,
            &mut self.world,
            &mut self.matches,
            &self.registries,
            &self.config,
            &self.events,
        )
    }

    /// Runs one tick: drains commands, then the schedule for every live match.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        for command in self.commands.drain() {
            let result = self.apply(&command);
            match &result {
                Ok(outcome) => {
                    report.commands += 1;
                    debug!(?outcome, "Applied command");
                },
                Err(error) => {
                    report.rejected += 1;
                    debug!(?command, %error, "Rejected command");
                },
            }
            self.receipts.push(CommandReceipt { command, result });
        }

        for state in self.matches.values_mut() {
            if state.is_over() {
                continue;
            }
            let map = match self.registries.map(&state.map) {
                Ok(map) => map,
                Err(error) => {
                    warn!(match_id = %state.id, %error, "Match map missing, skipping match");
                    continue;
                },
            };
            state.tick += 1;
            report.matches += 1;
            let mut ctx = TickContext {
                world: &mut self.world,
                state,
                map,
                registries: &self.registries,
                config: &self.config,
                events: &self.events,
                report: &mut report,
            };
            for (_, system) in SCHEDULE {
                system(&mut ctx);
                if ctx.state.is_over() {
                    info!(match_id = %ctx.state.id, winner = ?ctx.state.winner, "Match over");
                    break;
                }
            }
        }
        report
    }

    /// Runs ticks until `limit` is reached or every match is over.
    pub fn run_for(&mut self, limit: u64) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..limit {
            reports.push(self.tick());
            if !self.matches.is_empty() && self.matches.values().all(MatchState::is_over) {
                break;
            }
        }
        reports
    }
}
