//! Movement and collision resolution.
//!
//! Units move in ascending distance to the enemy base, so the front line
//! settles before the units behind it route around it. A unit either
//! follows the lane field or closes on its remembered target; engaged units
//! only turn to face what they are hitting.
//!
//! Every move goes through [`resolve_step`], which takes the mover out of
//! the spatial hash, pushes or walks around blockers and puts it back at
//! the final position.

use glam::Vec2;
use tracing::trace;

use arena_common::{circles_collide, direction_to, heading, rotate, ArenaResult, EntityId, EPSILON};

use crate::combat::CombatState;
use crate::components::{Attack, Body, CrowdControl, Movement, Position};
use crate::simulation::TickContext;
use crate::spatial_hash::{SpatialEntry, SpatialHash};

/// Orders units by distance to the enemy base, nearest first. Ties fall
/// back to entity id.
#[must_use]
pub fn movement_order(units: &[(EntityId, f32)]) -> Vec<EntityId> {
    let mut sorted = units.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    sorted.into_iter().map(|(id, _)| id).collect()
}

/// Movement system.
pub fn run(ctx: &mut TickContext<'_>) {
    let units: Vec<(EntityId, f32)> = ctx
        .members::<Movement>()
        .into_iter()
        .filter_map(|id| {
            ctx.world
                .get_ref::<Movement>(id)
                .ok()
                .map(|m| (id, m.distance_to_base))
        })
        .collect();
    ctx.for_each("movement", movement_order(&units), step);
}

fn step(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let mut cc = ctx.world.get::<CrowdControl>(id).unwrap_or_default();
    if cc.is_held() {
        return Ok(());
    }
    if cc.knocked_back {
        cc.knocked_back = false;
        ctx.world.set(id, cc)?;
        return Ok(());
    }

    let body = ctx.world.get_ref::<Body>(id)?;
    let (team, class, radius) = (body.team, body.class, body.radius);
    let mut pos = ctx.world.get::<Position>(id)?;
    let mut movement = ctx.world.get::<Movement>(id)?;
    let attack = ctx.world.get_ref::<Attack>(id)?;
    let (state, lock) = (attack.state, attack.target);
    let here = pos.xy();

    let chase = match state {
        CombatState::Stunned => return Ok(()),
        CombatState::Engaged | CombatState::Charging | CombatState::Channeling => {
            if let Some(lock) = lock {
                let at = live_position(ctx, lock.id).unwrap_or(lock.position);
                pos.rotation = heading(at - here);
                ctx.world.set(id, pos)?;
            }
            return Ok(());
        },
        CombatState::Approaching => lock,
        CombatState::Idle => None,
    };

    let desired = match chase {
        Some(lock) => {
            let at = live_position(ctx, lock.id).unwrap_or(lock.position);
            let stop = radius + lock.radius + ctx.config.approach_margin;
            let gap = here.distance(at) - stop;
            if gap <= 0.0 {
                pos.rotation = heading(at - here);
                ctx.world.set(id, pos)?;
                return Ok(());
            }
            here + direction_to(here, at) * movement.speed.min(gap)
        },
        None => ctx.map.clamp(here + ctx.map.lane_direction(here, team) * movement.speed),
    };

    let mover = SpatialEntry::new(id, here, radius, team, class);
    let end = resolve_step(ctx, mover, desired)?;
    if end.distance_squared(here) > EPSILON * EPSILON {
        pos.rotation = heading(end - here);
    }
    pos.set_xy(end);
    ctx.world.set(id, pos)?;
    movement.distance_to_base = ctx.map.distance_to_enemy_base(end, team);
    ctx.world.set(id, movement)?;
    Ok(())
}

fn live_position(ctx: &TickContext<'_>, id: EntityId) -> Option<Vec2> {
    ctx.world.get_ref::<Position>(id).ok().map(Position::xy)
}

/// Moves `mover` toward `desired` against the spatial hash and returns
/// where it ends up.
///
/// Enemy units in the way are shoved along by the same displacement when
/// they have room. Otherwise the mover tries rotated headings on both
/// sides, and stays put if none is clear. The mover is always re-indexed.
pub(crate) fn resolve_step(ctx: &mut TickContext<'_>, mover: SpatialEntry, desired: Vec2) -> ArenaResult<Vec2> {
    ctx.state.hash.remove(mover.id, mover.position, mover.radius);
    let result = settle(ctx, &mover, desired);
    let end = result.as_ref().map_or(mover.position, |p| *p);
    ctx.state.hash.insert(SpatialEntry {
        position: end,
        ..mover
    });
    result
}

fn settle(ctx: &mut TickContext<'_>, mover: &SpatialEntry, desired: Vec2) -> ArenaResult<Vec2> {
    let delta = desired - mover.position;
    if delta.length_squared() <= EPSILON * EPSILON {
        return Ok(mover.position);
    }
    let blocking = blockers(&ctx.state.hash, mover, desired);
    if blocking.is_empty() {
        return Ok(desired);
    }
    if push(ctx, mover, &blocking, delta)? {
        trace!(entity = ?mover.id, pushed = blocking.len(), "Pushed through");
        return Ok(desired);
    }
    Ok(walk_around(ctx, mover, delta).unwrap_or(mover.position))
}

/// Same-layer bodies `mover` would collide with at `at`.
///
/// A body the mover already overlaps does not block a move that takes the
/// two further apart.
fn blockers(hash: &SpatialHash, mover: &SpatialEntry, at: Vec2) -> Vec<SpatialEntry> {
    hash.query_entries(at, mover.radius)
        .into_iter()
        .filter(|e| e.id != mover.id && e.class.layer() == mover.class.layer())
        .filter(|e| {
            let overlapping = circles_collide(mover.position, mover.radius, e.position, e.radius);
            !(overlapping && e.position.distance_squared(at) > e.position.distance_squared(mover.position))
        })
        .collect()
}

fn push(ctx: &mut TickContext<'_>, mover: &SpatialEntry, blocking: &[SpatialEntry], delta: Vec2) -> ArenaResult<bool> {
    if !blocking.iter().all(|b| b.team != mover.team && b.class.is_mobile()) {
        return Ok(false);
    }
    for b in blocking {
        let spot = b.position + delta;
        if !ctx.map.contains(spot) {
            return Ok(false);
        }
        let clear = ctx
            .state
            .hash
            .query_entries(spot, b.radius)
            .iter()
            .all(|e| e.class.layer() != b.class.layer() || blocking.iter().any(|o| o.id == e.id));
        if !clear {
            return Ok(false);
        }
    }
    for b in blocking {
        let spot = b.position + delta;
        let mut pos = ctx.world.get::<Position>(b.id)?;
        pos.set_xy(spot);
        ctx.world.set(b.id, pos)?;
        ctx.state.hash.remove(b.id, b.position, b.radius);
        ctx.state.hash.insert(SpatialEntry {
            position: spot,
            ..*b
        });
        let distance = ctx.map.distance_to_enemy_base(spot, b.team);
        if let Ok(m) = ctx.world.get_mut::<Movement>(b.id) {
            m.distance_to_base = distance;
        }
    }
    Ok(true)
}

fn walk_around(ctx: &TickContext<'_>, mover: &SpatialEntry, delta: Vec2) -> Option<Vec2> {
    let step = ctx.config.walk_around_step_deg.to_radians();
    for k in 1..=ctx.config.walk_around_steps {
        for side in [1.0, -1.0] {
            let spot = mover.position + rotate(delta, side * k as f32 * step);
            if ctx.map.contains(spot) && blockers(&ctx.state.hash, mover, spot).is_empty() {
                return Some(spot);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::TargetLock;
    use crate::testkit::Fixture;
    use arena_common::{Team, UnitClass};

    fn xy(f: &Fixture, id: EntityId) -> Vec2 {
        f.world.get_ref::<Position>(id).expect("position").xy()
    }

    #[test]
    fn test_movement_order() {
        let units = [
            (EntityId::from_raw(1), 50.0),
            (EntityId::from_raw(2), 10.0),
            (EntityId::from_raw(3), 30.0),
        ];
        let order: Vec<u64> = movement_order(&units).into_iter().map(EntityId::raw).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_follows_lane() {
        let mut f = Fixture::new();
        let knight = f.spawn("knight", Team::Blue, 500.0, 500.0);
        step(&mut f.ctx(), knight).expect("step");

        assert_eq!(xy(&f, knight), Vec2::new(506.0, 500.0));
        let distance = f.world.get_ref::<Movement>(knight).expect("movement").distance_to_base;
        assert_eq!(distance, 1394.0);
        assert_eq!(f.state.hash.query_circle(Vec2::new(506.0, 500.0), 1.0), vec![knight]);
        assert!(f.state.hash.query_circle(Vec2::new(490.0, 500.0), 1.0).is_empty());
    }

    #[test]
    fn test_approach_stops_short() {
        let mut f = Fixture::new();
        let knight = f.spawn("knight", Team::Blue, 500.0, 500.0);
        let enemy = f.spawn("knight", Team::Red, 545.0, 500.0);
        let attack = f.world.get_mut::<Attack>(knight).expect("attack");
        attack.state = CombatState::Approaching;
        attack.target = Some(TargetLock {
            id: enemy,
            position: Vec2::new(545.0, 500.0),
            radius: 20.0,
            class: UnitClass::Melee,
        });

        step(&mut f.ctx(), knight).expect("step");
        assert_eq!(xy(&f, knight), Vec2::new(504.0, 500.0));
    }

    #[test]
    fn test_pushes_enemy_unit() {
        let mut f = Fixture::new();
        let knight = f.spawn("knight", Team::Blue, 500.0, 500.0);
        let enemy = f.spawn("knight", Team::Red, 542.0, 500.0);
        step(&mut f.ctx(), knight).expect("step");

        assert_eq!(xy(&f, knight), Vec2::new(506.0, 500.0));
        assert_eq!(xy(&f, enemy), Vec2::new(548.0, 500.0));
        assert_eq!(f.state.hash.query_circle(Vec2::new(548.0, 500.0), 1.0), vec![enemy]);
    }

    #[test]
    fn test_walks_around_structure() {
        let mut f = Fixture::new();
        let knight = f.spawn("knight", Team::Blue, 500.0, 500.0);
        let tower = f.spawn("tower", Team::Red, 565.0, 500.0);
        step(&mut f.ctx(), knight).expect("step");

        let end = xy(&f, knight);
        assert!((end.x - 503.0).abs() < 1e-3);
        assert!((end.y - 505.196).abs() < 1e-3);
        assert_eq!(xy(&f, tower), Vec2::new(565.0, 500.0));
    }

    #[test]
    fn test_air_passes_over_ground() {
        let mut f = Fixture::new();
        let dragon = f.spawn("dragon", Team::Blue, 500.0, 500.0);
        f.spawn("knight", Team::Red, 530.0, 500.0);
        step(&mut f.ctx(), dragon).expect("step");
        assert_eq!(xy(&f, dragon), Vec2::new(507.0, 500.0));
    }

    #[test]
    fn test_held_units_stay() {
        let mut f = Fixture::new();
        let knight = f.spawn("knight", Team::Blue, 500.0, 500.0);
        f.world.get_mut::<CrowdControl>(knight).expect("cc").stun = 1;
        step(&mut f.ctx(), knight).expect("step");
        assert_eq!(xy(&f, knight), Vec2::new(500.0, 500.0));
    }
}
