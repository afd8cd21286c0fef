//! Unit and structure creation.
//!
//! Spawning is split in two so commands can fail without side effects:
//! [`Blueprint::resolve`] does every lookup that can fail, and
//! [`Blueprint::spawn`] only writes.

use glam::Vec2;
use tracing::debug;

use arena_common::{direction_to, heading, ConfigError, EntityId, Team, Uid};

use crate::attack::Behavior;
use crate::components::{
    Attack, Body, CrowdControl, Health, Movement, Position, SpecialCharge, Structure, StructureState,
};
use crate::events::{EventBus, SimEvent};
use crate::match_state::MatchState;
use crate::registry::{Map, Registries, UnitStats};
use crate::spatial_hash::SpatialEntry;
use crate::store::World;

/// A unit type with its behavior already resolved.
#[derive(Debug, Clone)]
pub struct Blueprint {
    stats: UnitStats,
    behavior: Behavior,
}

impl Blueprint {
    /// Looks up `name` and resolves its attack and special power.
    pub fn resolve(registries: &Registries, name: &str) -> Result<Self, ConfigError> {
        let stats = registries.unit(name)?.clone();
        let behavior = registries.behavior(&stats)?;
        Ok(Self { stats, behavior })
    }

    /// Stat block.
    #[must_use]
    pub fn stats(&self) -> &UnitStats {
        &self.stats
    }

    /// Creates the entity, indexes it and announces it.
    pub fn spawn(
        &self,
        world: &mut World,
        state: &mut MatchState,
        map: &Map,
        team: Team,
        at: Vec2,
        events: &EventBus,
    ) -> (EntityId, Uid) {
        let stats = &self.stats;
        let uid = state.allocate_uid();
        let facing = heading(direction_to(at, map.base(team.opponent())));

        let body = Body {
            name: stats.name.clone(),
            match_id: state.id,
            uid,
            team,
            class: stats.class,
            radius: stats.radius,
        };
        let mobile = stats.class.is_mobile();
        let special = stats.special.as_ref().map(|sp| SpecialCharge {
            rate: sp.rate,
            current: 0,
            max: sp.max_charge,
            gain: sp.charge_per_attack,
            charged: false,
            damage_frame: sp.damage_frame,
            damage_end_frame: sp.damage_end_frame,
            attack_radius: sp.attack_radius,
            structure_targetable: sp.structure_targetable,
            target: None,
        });

        let id = world
            .create()
            .with(Position {
                rotation: facing,
                ..Position::new(at.x, at.y)
            })
            .with(body)
            .with(Health::new(stats.health))
            .with(Attack::new(
                stats.damage,
                stats.attack_rate,
                stats.damage_frame,
                stats.attack_radius,
                stats.aggro_radius,
            ))
            .with(self.behavior.clone())
            .with_opt(special)
            .with_opt(mobile.then(|| Movement {
                speed: stats.speed,
                distance_to_base: map.distance_to_enemy_base(at, team),
            }))
            .with_opt(mobile.then(CrowdControl::default))
            .with_opt(stats.structure.map(|kind| Structure {
                kind,
                state: StructureState::Default,
            }))
            .id();

        state
            .hash
            .insert(SpatialEntry::new(id, at, stats.radius, team, stats.class));

        debug!(entity = ?id, %uid, unit = %stats.name, ?team, "Spawned");
        events.publish(SimEvent::UnitSpawned {
            match_id: state.id,
            entity: id,
            uid,
            name: stats.name.clone(),
            team,
        });
        (id, uid)
    }
}
