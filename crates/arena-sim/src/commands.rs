//! Inbound commands.
//!
//! The host pushes [`Command`]s onto a bounded [`CommandQueue`]; the
//! simulation drains it once at the start of every tick. Each command is
//! validated in full before anything is written, so a rejected command
//! leaves the store and match records untouched.

use std::collections::BTreeMap;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::info;

use arena_common::{ArenaResult, CommandError, EntityId, MatchId, Team, Uid};

use crate::components::{Body, Effect};
use crate::config::SimConfig;
use crate::events::EventBus;
use crate::match_state::{MatchState, Player};
use crate::registry::Registries;
use crate::spatial_hash::SpatialHash;
use crate::spawn::Blueprint;
use crate::store::World;

/// A player joining a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Display name
    pub nickname: String,
    /// Cards in draw order
    pub deck: Vec<String>,
}

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Start a match on a map, blue player first.
    CreateMatch {
        /// New match id
        match_id: MatchId,
        /// Map name
        map: String,
        /// Blue then red
        players: [PlayerSetup; 2],
    },
    /// Deploy a unit from a player's hand.
    CreateUnit {
        /// Match
        match_id: MatchId,
        /// Deploying side
        team: Team,
        /// Card name
        unit: String,
        /// Spawn x
        x: f32,
        /// Spawn y
        y: f32,
    },
    /// Acknowledge removed UIDs.
    RemoveUnits {
        /// Match
        match_id: MatchId,
        /// Acknowledging side
        team: Team,
        /// UIDs the client has removed
        uids: Vec<Uid>,
    },
    /// Tear down a match and every entity in it.
    RemoveAllEntities {
        /// Match
        match_id: MatchId,
    },
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Match created with its structures
    MatchCreated {
        /// Match
        match_id: MatchId,
        /// UIDs of the placed structures
        structures: Vec<Uid>,
    },
    /// Unit deployed
    UnitCreated {
        /// Match
        match_id: MatchId,
        /// Entity id
        entity: EntityId,
        /// Client-facing id
        uid: Uid,
    },
    /// Removals acknowledged
    UnitsRemoved {
        /// Match
        match_id: MatchId,
        /// How many of the UIDs were pending
        acknowledged: usize,
    },
    /// Match torn down
    MatchRemoved {
        /// Match
        match_id: MatchId,
        /// Entities removed
        entities: usize,
    },
}

/// A drained command and what became of it.
#[derive(Debug, Clone)]
pub struct CommandReceipt {
    /// The command
    pub command: Command,
    /// Its result
    pub result: ArenaResult<CommandOutcome>,
}

/// Bounded inbound queue.
#[derive(Debug)]
pub struct CommandQueue {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
}

impl CommandQueue {
    /// Creates a queue holding up to `capacity` commands.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Enqueues a command without blocking.
    pub fn push(&self, command: Command) -> Result<(), CommandError> {
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) | TrySendError::Disconnected(_) => CommandError::QueueFull,
        })
    }

    /// Handle for producers on other threads.
    #[must_use]
    pub fn sender(&self) -> Sender<Command> {
        self.sender.clone()
    }

    /// Takes every queued command in arrival order.
    pub fn drain(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Applies one command.
pub(crate) fn apply(
    command: &Command,
    world: &mut World,
    matches: &mut BTreeMap<MatchId, MatchState>,
    registries: &Registries,
    config: &SimConfig,
    events: &EventBus,
) -> ArenaResult<CommandOutcome> {
    match command {
        Command::CreateMatch {
            match_id,
            map,
            players,
        } => create_match(*match_id, map, players, world, matches, registries, config, events),
        Command::CreateUnit {
            match_id,
            team,
            unit,
            x,
            y,
        } => {
            let state = matches
                .get_mut(match_id)
                .ok_or(CommandError::UnknownMatch(*match_id))?;
            create_unit(state, *team, unit, Vec2::new(*x, *y), world, registries, events)
        },
        Command::RemoveUnits { match_id, team, uids } => {
            let state = matches
                .get_mut(match_id)
                .ok_or(CommandError::UnknownMatch(*match_id))?;
            Ok(CommandOutcome::UnitsRemoved {
                match_id: *match_id,
                acknowledged: state.player_mut(*team).acknowledge(uids),
            })
        },
        Command::RemoveAllEntities { match_id } => {
            if matches.remove(match_id).is_none() {
                return Err(CommandError::UnknownMatch(*match_id).into());
            }
            let doomed: Vec<EntityId> = world
                .iter::<Body>()
                .filter(|(_, b)| b.match_id == *match_id)
                .map(|(id, _)| id)
                .chain(
                    world
                        .iter::<Effect>()
                        .filter(|(_, e)| e.match_id == *match_id)
                        .map(|(id, _)| id),
                )
                .collect();
            let mut entities = 0;
            for id in doomed {
                if world.remove(id).is_ok() {
                    entities += 1;
                }
            }
            info!(%match_id, entities, "Removed match");
            Ok(CommandOutcome::MatchRemoved {
                match_id: *match_id,
                entities,
            })
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn create_match(
    match_id: MatchId,
    map_name: &str,
    setups: &[PlayerSetup; 2],
    world: &mut World,
    matches: &mut BTreeMap<MatchId, MatchState>,
    registries: &Registries,
    config: &SimConfig,
    events: &EventBus,
) -> ArenaResult<CommandOutcome> {
    if matches.contains_key(&match_id) {
        return Err(CommandError::MatchExists(match_id).into());
    }
    let map = registries.map(map_name)?;
    for card in setups.iter().flat_map(|s| &s.deck) {
        if !registries.unit(card)?.is_deployable() {
            return Err(CommandError::NotDeployable(card.clone()).into());
        }
    }
    let placements = map
        .def()
        .structures
        .iter()
        .map(|p| Ok((Blueprint::resolve(registries, &p.unit)?, p.team, Vec2::from(p.at))))
        .collect::<ArenaResult<Vec<_>>>()?;
    let hash = SpatialHash::new(Vec2::ZERO, config.cell_size)?;

    let players = [Team::Blue, Team::Red].map(|team| {
        let setup = &setups[team.index()];
        Player::new(setup.nickname.clone(), team, setup.deck.clone(), config)
    });
    let mut state = MatchState::new(match_id, map_name, players, hash);
    let structures = placements
        .iter()
        .map(|(blueprint, team, at)| blueprint.spawn(world, &mut state, map, *team, *at, events).1)
        .collect();
    matches.insert(match_id, state);
    info!(%match_id, map = map_name, "Created match");
    Ok(CommandOutcome::MatchCreated { match_id, structures })
}

fn create_unit(
    state: &mut MatchState,
    team: Team,
    unit: &str,
    at: Vec2,
    world: &mut World,
    registries: &Registries,
    events: &EventBus,
) -> ArenaResult<CommandOutcome> {
    if state.is_over() {
        return Err(CommandError::MatchOver(state.id).into());
    }
    let blueprint = Blueprint::resolve(registries, unit)?;
    if !blueprint.stats().is_deployable() {
        return Err(CommandError::NotDeployable(unit.to_string()).into());
    }
    let map = registries.map(&state.map)?;
    if !map.contains(at) {
        return Err(CommandError::OutOfBounds { x: at.x, y: at.y }.into());
    }
    state.player_mut(team).play(unit, blueprint.stats().cost)?;
    let (entity, uid) = blueprint.spawn(world, state, map, team, at, events);
    Ok(CommandOutcome::UnitCreated {
        match_id: state.id,
        entity,
        uid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        world: World,
        matches: BTreeMap<MatchId, MatchState>,
        registries: Registries,
        config: SimConfig,
        events: EventBus,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                world: World::new(),
                matches: BTreeMap::new(),
                registries: Registries::builtin().expect("built-in registries"),
                config: SimConfig::default(),
                events: EventBus::new(256),
            }
        }

        fn run(&mut self, command: Command) -> ArenaResult<CommandOutcome> {
            apply(
                &command,
                &mut self.world,
                &mut self.matches,
                &self.registries,
                &self.config,
                &self.events,
            )
        }
    }

    fn setup(nickname: &str) -> PlayerSetup {
        PlayerSetup {
            nickname: nickname.into(),
            deck: vec!["knight".into(), "archer".into(), "giant".into(), "cleric".into(), "dragon".into()],
        }
    }

    fn create(id: u64) -> Command {
        Command::CreateMatch {
            match_id: MatchId::new(id),
            map: "arena".into(),
            players: [setup("blue"), setup("red")],
        }
    }

    fn deploy(unit: &str, x: f32) -> Command {
        Command::CreateUnit {
            match_id: MatchId::new(1),
            team: Team::Blue,
            unit: unit.into(),
            x,
            y: 500.0,
        }
    }

    #[test]
    fn test_create_match_places_structures() {
        let mut h = Harness::new();
        let outcome = h.run(create(1)).expect("match created");
        match outcome {
            CommandOutcome::MatchCreated { structures, .. } => assert_eq!(structures.len(), 6),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(h.world.len(), 6);
        assert!(matches!(
            h.run(create(1)),
            Err(arena_common::ArenaError::Command(CommandError::MatchExists(_)))
        ));
    }

    #[test]
    fn test_create_match_unknown_map_mutates_nothing() {
        let mut h = Harness::new();
        let result = h.run(Command::CreateMatch {
            match_id: MatchId::new(1),
            map: "moon".into(),
            players: [setup("blue"), setup("red")],
        });
        assert!(result.as_ref().is_err_and(|e| e.is_config()));
        assert!(h.world.is_empty());
        assert!(h.matches.is_empty());
    }

    #[test]
    fn test_create_unit_spends_gold() {
        let mut h = Harness::new();
        h.run(create(1)).expect("match created");
        let outcome = h.run(deploy("knight", 500.0)).expect("unit created");
        assert!(matches!(outcome, CommandOutcome::UnitCreated { .. }));
        let player = h.matches[&MatchId::new(1)].player(Team::Blue);
        assert_eq!(player.gold, 2.0);
        assert!(!player.hand.contains(&"knight".to_string()));
    }

    #[test]
    fn test_create_unit_rejections_leave_state() {
        let mut h = Harness::new();
        h.run(create(1)).expect("match created");
        let entities = h.world.len();

        assert!(h.run(deploy("giant", 500.0)).is_ok());
        let entities = entities + 1;
        // giant cost 5 of 5 gold; nothing left for another unit
        assert!(matches!(
            h.run(deploy("knight", 500.0)),
            Err(arena_common::ArenaError::Command(CommandError::InsufficientGold { .. }))
        ));
        assert!(matches!(
            h.run(deploy("flamer", 500.0)),
            Err(arena_common::ArenaError::Command(CommandError::CardNotInHand(_)))
        ));
        assert!(matches!(
            h.run(deploy("tower", 500.0)),
            Err(arena_common::ArenaError::Command(CommandError::NotDeployable(_)))
        ));
        assert!(matches!(
            h.run(deploy("knight", -10.0)),
            Err(arena_common::ArenaError::Command(CommandError::OutOfBounds { .. }))
        ));
        assert_eq!(h.world.len(), entities);
    }

    #[test]
    fn test_remove_all_entities() {
        let mut h = Harness::new();
        h.run(create(1)).expect("match created");
        h.run(create(2)).expect("second match");
        let outcome = h
            .run(Command::RemoveAllEntities {
                match_id: MatchId::new(1),
            })
            .expect("removed");
        assert_eq!(
            outcome,
            CommandOutcome::MatchRemoved {
                match_id: MatchId::new(1),
                entities: 6
            }
        );
        assert_eq!(h.world.len(), 6);
        assert!(h.run(deploy("knight", 500.0)).is_err());
    }

    #[test]
    fn test_queue_full() {
        let queue = CommandQueue::new(1);
        assert!(queue.push(create(1)).is_ok());
        assert_eq!(queue.push(create(2)), Err(CommandError::QueueFull));
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }
}
