//! Closest-enemy search and the per-tick combat check.
//!
//! The search walks the spatial hash breadth-first from the searcher's cell.
//! It ranks candidates by `distance² − radius²`, which is not the true
//! distance to a circle's edge and can misrank bodies of very different
//! sizes. The ranking is kept because unit balance was tuned against it.

use std::collections::VecDeque;

use ahash::AHashSet;
use glam::Vec2;
use tracing::trace;

use arena_common::{edge_distance, ArenaResult, EntityId, Team, UnitClass};

use crate::attack::Behavior;
use crate::combat::{release_target, CombatEvent, CombatState};
use crate::components::{Attack, Body, Position, SpecialCharge, Structure, StructureState, TargetLock};
use crate::simulation::TickContext;
use crate::spatial_hash::{CellKey, SeenIds, SpatialEntry, SpatialHash};

/// Who is searching and for what.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchQuery {
    /// Search origin
    pub origin: Vec2,
    /// Searching entity, never returned
    pub searcher: EntityId,
    /// Cells whose centre lies further than this are not expanded
    pub aggro_radius: f32,
    /// Searcher's team
    pub team: Team,
    /// Searcher's class
    pub class: UnitClass,
    /// Whether structures are acceptable targets
    pub structures: bool,
}

impl SearchQuery {
    fn accepts(&self, entry: &SpatialEntry) -> bool {
        entry.id != self.searcher
            && entry.team != self.team
            && self.class.can_target(entry.class)
            && (self.structures || entry.class != UnitClass::Structure)
    }
}

/// Breadth-first closest-enemy search.
///
/// Expands ring by ring while no candidate has been found, and only into
/// cells whose centre lies within the aggro radius. Ties keep the first
/// candidate found.
#[must_use]
pub fn closest_enemy(hash: &SpatialHash, query: &SearchQuery) -> Option<SpatialEntry> {
    let start = hash.key_of(query.origin);
    let mut visited: AHashSet<CellKey> = AHashSet::new();
    let mut seen = SeenIds::new();
    let mut frontier: VecDeque<CellKey> = VecDeque::from([start]);
    visited.insert(start);

    let mut best: Option<(f32, SpatialEntry)> = None;
    while !frontier.is_empty() {
        let mut next = VecDeque::new();
        for key in frontier.drain(..) {
            if let Some(cell) = hash.cell(key) {
                for entry in cell.entries() {
                    if !query.accepts(entry) || !seen.first_visit(entry.id) {
                        continue;
                    }
                    let score = query.origin.distance_squared(entry.position) - entry.radius * entry.radius;
                    if best.map_or(true, |(b, _)| score < b) {
                        best = Some((score, *entry));
                    }
                }
            }
            if best.is_some() {
                continue;
            }
            for (dx, dy) in NEIGHBORS {
                let n = (key.0 + dx, key.1 + dy);
                if hash.cell_center(n).distance(query.origin) <= query.aggro_radius && visited.insert(n) {
                    next.push_back(n);
                }
            }
        }
        if best.is_some() {
            break;
        }
        frontier = next;
    }
    best.map(|(_, entry)| entry)
}

const NEIGHBORS: [(i32, i32); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];

impl From<&SpatialEntry> for TargetLock {
    fn from(entry: &SpatialEntry) -> Self {
        Self {
            id: entry.id,
            position: entry.position,
            radius: entry.radius,
            class: entry.class,
        }
    }
}

/// Combat-check system: searching units look for enemies, engaged units
/// check their target is still in reach.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.members::<Attack>();
    ctx.for_each("targeting", ids, check);
}

fn check(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    if ctx
        .world
        .get_ref::<Structure>(id)
        .is_ok_and(|s| s.state == StructureState::Converting)
    {
        return Ok(());
    }
    let body = ctx.world.get_ref::<Body>(id)?;
    let (team, class, radius) = (body.team, body.class, body.radius);
    let here = ctx.world.get_ref::<Position>(id)?.xy();
    let mut attack = ctx.world.get::<Attack>(id)?;

    match attack.state {
        CombatState::Idle | CombatState::Approaching => {
            let query = SearchQuery {
                origin: here,
                searcher: id,
                aggro_radius: attack.aggro_radius,
                team,
                class,
                structures: true,
            };
            let tolerance = ctx.config.range_tolerance;
            match closest_enemy(&ctx.state.hash, &query) {
                Some(enemy) => {
                    let gap = edge_distance(here, radius, enemy.position, enemy.radius);
                    if gap <= attack.attack_radius + tolerance {
                        attack.state = attack.state.next(CombatEvent::InRange);
                        attack.frame = 0;
                        attack.target = Some(TargetLock::from(&enemy));
                        trace!(entity = ?id, target = ?enemy.id, gap, "Engaged");
                    } else if gap <= attack.aggro_radius {
                        attack.state = attack.state.next(CombatEvent::Spotted);
                        attack.target = Some(TargetLock::from(&enemy));
                    } else {
                        attack.state = attack.state.next(CombatEvent::TargetLost);
                        attack.target = None;
                    }
                },
                None => {
                    attack.state = attack.state.next(CombatEvent::TargetLost);
                    attack.target = None;
                },
            }
            ctx.world.set(id, attack)?;
        },
        CombatState::Engaged | CombatState::Charging => {
            let mut special = ctx.world.get::<SpecialCharge>(id).ok();
            let charged = attack.state == CombatState::Charging;
            let lock = if charged {
                special.and_then(|sp| sp.target).or(attack.target)
            } else {
                attack.target
            };
            let channeling = ctx.world.get_ref::<Behavior>(id)?.attack.is_channeling();

            let refreshed = lock.and_then(|lock| {
                let target_body = ctx.world.get_ref::<Body>(lock.id).ok()?;
                if target_body.team == team {
                    return None;
                }
                let p = ctx.world.get_ref::<Position>(lock.id).ok()?;
                Some(TargetLock {
                    position: p.xy(),
                    ..lock
                })
            });

            let reach = match (charged, special) {
                (true, Some(sp)) => sp.attack_radius,
                _ => attack.attack_radius,
            } + ctx.config.range_tolerance;

            match refreshed {
                Some(lock) => {
                    let gap = edge_distance(here, radius, lock.position, lock.radius);
                    if gap > attack.aggro_radius {
                        release_target(&mut attack, special.as_mut(), channeling);
                    } else if gap > reach {
                        if lock.class == UnitClass::Structure && class.is_mobile() {
                            attack.state = attack.state.next(CombatEvent::Drifted);
                            attack.frame = 0;
                            attack.target = Some(lock);
                            if let Some(sp) = special.as_mut() {
                                sp.charged = false;
                                sp.target = None;
                            }
                        } else {
                            release_target(&mut attack, special.as_mut(), channeling);
                        }
                    } else if charged {
                        if let Some(sp) = special.as_mut() {
                            sp.target = Some(lock);
                        }
                    } else {
                        attack.target = Some(lock);
                    }
                },
                None => release_target(&mut attack, special.as_mut(), channeling),
            }
            ctx.world.set(id, attack)?;
            if let Some(sp) = special {
                ctx.world.set(id, sp)?;
            }
        },
        CombatState::Channeling | CombatState::Stunned => {},
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Fixture;
    use proptest::prelude::*;

    fn hash() -> SpatialHash {
        SpatialHash::new(Vec2::ZERO, 100.0).expect("valid cell size")
    }

    fn entry(id: u64, x: f32, y: f32, r: f32, team: Team, class: UnitClass) -> SpatialEntry {
        SpatialEntry::new(EntityId::from_raw(id), Vec2::new(x, y), r, team, class)
    }

    fn query(origin: Vec2, class: UnitClass) -> SearchQuery {
        SearchQuery {
            origin,
            searcher: EntityId::from_raw(1),
            aggro_radius: 400.0,
            team: Team::Blue,
            class,
            structures: true,
        }
    }

    #[test]
    fn test_finds_nearest_enemy() {
        let mut h = hash();
        h.insert(entry(1, 0.0, 0.0, 50.0, Team::Blue, UnitClass::Melee));
        h.insert(entry(2, 120.0, 0.0, 50.0, Team::Red, UnitClass::Melee));
        h.insert(entry(3, 300.0, 0.0, 50.0, Team::Red, UnitClass::Melee));

        let found = closest_enemy(&h, &query(Vec2::ZERO, UnitClass::Melee)).map(|e| e.id.raw());
        assert_eq!(found, Some(2));
    }

    #[test]
    fn test_expands_to_far_rings() {
        let mut h = hash();
        h.insert(entry(2, 350.0, 50.0, 10.0, Team::Red, UnitClass::Range));
        let found = closest_enemy(&h, &query(Vec2::new(50.0, 50.0), UnitClass::Range));
        assert_eq!(found.map(|e| e.id.raw()), Some(2));
    }

    #[test]
    fn test_respects_aggro_bound() {
        let mut h = hash();
        h.insert(entry(2, 950.0, 50.0, 10.0, Team::Red, UnitClass::Range));
        assert!(closest_enemy(&h, &query(Vec2::new(50.0, 50.0), UnitClass::Range)).is_none());
    }

    #[test]
    fn test_class_rules() {
        let mut h = hash();
        h.insert(entry(2, 60.0, 0.0, 10.0, Team::Red, UnitClass::Air));
        h.insert(entry(3, 80.0, 0.0, 30.0, Team::Red, UnitClass::Structure));

        let melee = closest_enemy(&h, &query(Vec2::ZERO, UnitClass::Melee));
        assert_eq!(melee.map(|e| e.id.raw()), Some(3));

        let no_structures = SearchQuery {
            structures: false,
            ..query(Vec2::ZERO, UnitClass::Range)
        };
        assert_eq!(closest_enemy(&h, &no_structures).map(|e| e.id.raw()), Some(2));
        let no_structures_melee = SearchQuery {
            structures: false,
            ..query(Vec2::ZERO, UnitClass::Melee)
        };
        assert!(closest_enemy(&h, &no_structures_melee).is_none());
    }

    #[test]
    fn test_radius_adjusted_ranking() {
        let mut h = hash();
        h.insert(entry(2, 60.0, 0.0, 5.0, Team::Red, UnitClass::Melee));
        h.insert(entry(3, 0.0, 70.0, 40.0, Team::Red, UnitClass::Melee));
        let found = closest_enemy(&h, &query(Vec2::ZERO, UnitClass::Melee));
        assert_eq!(found.map(|e| e.id.raw()), Some(3));
    }

    fn lock_on(fx: &mut Fixture, attacker: EntityId, target: EntityId) {
        let body = fx.world.get_ref::<Body>(target).expect("body");
        let (radius, class) = (body.radius, body.class);
        let position = fx.world.get_ref::<Position>(target).expect("position").xy();
        let attack = fx.world.get_mut::<Attack>(attacker).expect("attack");
        attack.state = CombatState::Engaged;
        attack.frame = 4;
        attack.target = Some(TargetLock {
            id: target,
            position,
            radius,
            class,
        });
    }

    fn checked(fx: &mut Fixture, id: EntityId) -> Attack {
        run(&mut fx.ctx());
        fx.world.get::<Attack>(id).expect("attack")
    }

    #[test]
    fn test_engaged_tracks_target_in_reach() {
        let mut fx = Fixture::new();
        let knight = fx.spawn("knight", Team::Blue, 1000.0, 500.0);
        let enemy = fx.spawn("knight", Team::Red, 1045.0, 500.0);
        lock_on(&mut fx, knight, enemy);
        fx.world.get_mut::<Position>(enemy).expect("position").y = 505.0;

        let attack = checked(&mut fx, knight);
        assert_eq!(attack.state, CombatState::Engaged);
        assert_eq!(attack.frame, 4);
        assert_eq!(attack.target.map(|t| t.position), Some(Vec2::new(1045.0, 505.0)));
    }

    #[test]
    fn test_engaged_releases_past_aggro() {
        let mut fx = Fixture::new();
        let knight = fx.spawn("knight", Team::Blue, 1000.0, 500.0);
        let enemy = fx.spawn("knight", Team::Red, 1045.0, 500.0);
        lock_on(&mut fx, knight, enemy);
        fx.world.get_mut::<Position>(enemy).expect("position").x = 1400.0;

        let attack = checked(&mut fx, knight);
        assert_eq!(attack.state, CombatState::Idle);
        assert!(attack.target.is_none());
        assert_eq!(attack.frame, 0);
    }

    #[test]
    fn test_unit_drifting_out_of_reach_is_released() {
        let mut fx = Fixture::new();
        let knight = fx.spawn("knight", Team::Blue, 1000.0, 500.0);
        let enemy = fx.spawn("knight", Team::Red, 1045.0, 500.0);
        lock_on(&mut fx, knight, enemy);
        fx.world.get_mut::<Position>(enemy).expect("position").x = 1070.0;

        let attack = checked(&mut fx, knight);
        assert_eq!(attack.state, CombatState::Idle);
        assert!(attack.target.is_none());
    }

    #[test]
    fn test_structure_out_of_reach_is_chased() {
        let mut fx = Fixture::new();
        let knight = fx.spawn("knight", Team::Blue, 1500.0, 250.0);
        let tower = fx.spawn("tower", Team::Red, 1600.0, 250.0);
        lock_on(&mut fx, knight, tower);
        {
            let sp = fx.world.get_mut::<SpecialCharge>(knight).expect("special");
            sp.charged = true;
        }

        let attack = checked(&mut fx, knight);
        assert_eq!(attack.state, CombatState::Approaching);
        assert_eq!(attack.target_id(), Some(tower));
        assert_eq!(attack.frame, 0);
        assert!(!fx.world.get_ref::<SpecialCharge>(knight).expect("special").charged);
    }

    #[test]
    fn test_converted_target_is_released() {
        let mut fx = Fixture::new();
        let knight = fx.spawn("knight", Team::Blue, 1545.0, 250.0);
        let tower = fx.spawn("tower", Team::Red, 1600.0, 250.0);
        lock_on(&mut fx, knight, tower);
        fx.world.get_mut::<Body>(tower).expect("body").team = Team::Blue;

        let attack = checked(&mut fx, knight);
        assert_eq!(attack.state, CombatState::Idle);
        assert!(attack.target.is_none());
    }

    #[test]
    fn test_converting_structure_skips_search() {
        let mut fx = Fixture::new();
        let tower = fx.spawn("tower", Team::Red, 1600.0, 250.0);
        fx.spawn("knight", Team::Blue, 1545.0, 250.0);
        fx.world.get_mut::<Structure>(tower).expect("structure").state = StructureState::Converting;

        assert_eq!(checked(&mut fx, tower).state, CombatState::Idle);
        fx.world.get_mut::<Structure>(tower).expect("structure").state = StructureState::Default;
        assert_eq!(checked(&mut fx, tower).state, CombatState::Engaged);
    }

    proptest! {
        #[test]
        fn prop_never_self_or_ally(
            bodies in prop::collection::vec((0.0f32..800.0, 0.0f32..800.0, 1.0f32..60.0, any::<bool>()), 0..40),
            ox in 0.0f32..800.0,
            oy in 0.0f32..800.0,
        ) {
            let mut h = hash();
            h.insert(entry(1, ox, oy, 20.0, Team::Red, UnitClass::Range));
            for (i, (x, y, r, red)) in bodies.into_iter().enumerate() {
                let team = if red { Team::Red } else { Team::Blue };
                h.insert(entry(i as u64 + 2, x, y, r, team, UnitClass::Melee));
            }
            let q = SearchQuery { team: Team::Red, ..query(Vec2::new(ox, oy), UnitClass::Range) };
            if let Some(found) = closest_enemy(&h, &q) {
                prop_assert_ne!(found.id, EntityId::from_raw(1));
                prop_assert_eq!(found.team, Team::Blue);
            }
        }
    }
}
