//! Fixture for driving single systems against one match.

use glam::Vec2;

use arena_common::{EntityId, MatchId, Team};

use crate::config::SimConfig;
use crate::events::EventBus;
use crate::match_state::{MatchState, Player};
use crate::registry::Registries;
use crate::simulation::{TickContext, TickReport};
use crate::spatial_hash::SpatialHash;
use crate::spawn::Blueprint;
use crate::store::World;

pub(crate) struct Fixture {
    pub world: World,
    pub state: MatchState,
    pub registries: Registries,
    pub config: SimConfig,
    pub events: EventBus,
    pub report: TickReport,
}

impl Fixture {
    pub fn new() -> Self {
        let config = SimConfig::default();
        let deck: Vec<String> = ["knight", "archer", "giant", "cleric", "dragon"]
            .into_iter()
            .map(String::from)
            .collect();
        let players = [
            Player::new("blue", Team::Blue, deck.clone(), &config),
            Player::new("red", Team::Red, deck, &config),
        ];
        let hash = SpatialHash::new(Vec2::ZERO, config.cell_size).expect("valid cell size");
        Self {
            world: World::new(),
            state: MatchState::new(MatchId::new(1), "arena", players, hash),
            registries: Registries::builtin().expect("built-in registries"),
            events: EventBus::new(256),
            config,
            report: TickReport::default(),
        }
    }

    pub fn ctx(&mut self) -> TickContext<'_> {
        let map = self.registries.map("arena").expect("built-in map");
        TickContext {
            world: &mut self.world,
            state: &mut self.state,
            map,
            registries: &self.registries,
            config: &self.config,
            events: &self.events,
            report: &mut self.report,
        }
    }

    pub fn spawn(&mut self, unit: &str, team: Team, x: f32, y: f32) -> EntityId {
        let blueprint = Blueprint::resolve(&self.registries, unit).expect("known unit");
        let map = self.registries.map("arena").expect("built-in map");
        blueprint
            .spawn(&mut self.world, &mut self.state, map, team, Vec2::new(x, y), &self.events)
            .0
    }
}
