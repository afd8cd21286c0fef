//! Projectile flight.
//!
//! Homing projectiles chase a live target and are flagged as hits once they
//! pass it. Straight projectiles spend a travel budget and strike the first
//! enemy body their path crosses. Damage is applied by the attack phase and
//! removal by the destroyer.

use glam::{Vec2, Vec3};

use arena_common::{has_passed, heading, segment_circle_entry, ArenaResult, EntityId, Team, UnitClass};

use crate::attack::ProjectileSpawn;
use crate::components::{Body, Guidance, Position, Projectile};
use crate::simulation::TickContext;
use crate::spatial_hash::SpatialHash;

/// Creates a projectile entity. Projectiles carry a UID but are not indexed.
pub fn launch(ctx: &mut TickContext<'_>, owner: EntityId, team: Team, spawn: ProjectileSpawn) -> EntityId {
    let uid = ctx.state.allocate_uid();
    let rotation = match spawn.guidance {
        Guidance::Straight { direction, .. } => heading(direction),
        Guidance::Homing { target } => ctx
            .world
            .get_ref::<Position>(target)
            .map(|p| heading(p.xy() - spawn.origin.truncate()))
            .unwrap_or_default(),
    };
    ctx.world
        .create()
        .with(Position {
            x: spawn.origin.x,
            y: spawn.origin.y,
            z: spawn.origin.z,
            rotation,
        })
        .with(Body {
            name: spawn.stats.name.clone(),
            match_id: ctx.state.id,
            uid,
            team,
            class: UnitClass::Projectile,
            radius: spawn.stats.radius,
        })
        .with(Projectile {
            owner,
            speed: spawn.stats.speed,
            damage: spawn.damage,
            center_offset: spawn.stats.center_offset,
            guidance: spawn.guidance,
            strike: None,
            hit: false,
            destroyed: false,
        })
        .id()
}

/// Result of one homing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingStep {
    /// New position
    pub position: Vec3,
    /// Whether the projectile passed its aim point
    pub passed: bool,
}

/// Moves `speed` toward `aim`. Passing the aim point snaps onto it.
#[must_use]
pub fn home(from: Vec3, aim: Vec3, speed: f32) -> HomingStep {
    let to = from + (aim - from).normalize_or_zero() * speed;
    if has_passed(from, to, aim) {
        HomingStep {
            position: aim,
            passed: true,
        }
    } else {
        HomingStep {
            position: to,
            passed: false,
        }
    }
}

/// First enemy body crossed by the segment `a → b`, with the fraction of
/// the segment travelled before contact.
#[must_use]
pub fn first_crossed(hash: &SpatialHash, a: Vec2, b: Vec2, radius: f32, team: Team) -> Option<(EntityId, f32)> {
    let mid = (a + b) * 0.5;
    let reach = a.distance(b) * 0.5 + radius;
    let mut best: Option<(EntityId, f32)> = None;
    for entry in hash.query_entries(mid, reach) {
        if entry.team == team || entry.class == UnitClass::Projectile {
            continue;
        }
        if let Some(t) = segment_circle_entry(a, b, entry.position, entry.radius + radius) {
            if best.map_or(true, |(_, bt)| t < bt) {
                best = Some((entry.id, t));
            }
        }
    }
    best
}

/// Projectile-flight system.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.members::<Projectile>();
    ctx.for_each("projectiles", ids, fly);
}

fn fly(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let mut shot = ctx.world.get::<Projectile>(id)?;
    if shot.hit || shot.destroyed {
        return Ok(());
    }
    let mut pos = ctx.world.get::<Position>(id)?;
    let from = pos.xyz();

    match shot.guidance {
        Guidance::Homing { target } => {
            let Ok(target_pos) = ctx.world.get_ref::<Position>(target) else {
                shot.destroyed = true;
                ctx.world.set(id, shot)?;
                return Ok(());
            };
            let aim = target_pos.xyz() + Vec3::Z * shot.center_offset;
            let step = home(from, aim, shot.speed);
            if step.passed {
                shot.hit = true;
                shot.strike = Some(target);
            }
            pos.rotation = heading((aim - from).truncate());
            pos.x = step.position.x;
            pos.y = step.position.y;
            pos.z = step.position.z;
        },
        Guidance::Straight { direction, remaining } => {
            let travel = shot.speed.min(remaining);
            let a = from.truncate();
            let b = a + direction * travel;
            let body = ctx.world.get_ref::<Body>(id)?;
            let (radius, team) = (body.radius, body.team);
            let end = match first_crossed(&ctx.state.hash, a, b, radius, team) {
                Some((target, t)) => {
                    shot.hit = true;
                    shot.strike = Some(target);
                    a + (b - a) * t
                },
                None => b,
            };
            let remaining = remaining - travel;
            if remaining <= 0.0 && !shot.hit {
                shot.destroyed = true;
            }
            shot.guidance = Guidance::Straight { direction, remaining };
            pos.set_xy(end);
        },
    }

    ctx.world.set(id, pos)?;
    ctx.world.set(id, shot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_hash::SpatialEntry;
    use crate::testkit::Fixture;

    #[test]
    fn test_passes_stationary_target() {
        let step = home(Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0), 100.0);
        assert!(step.passed);
        assert_eq!(step.position, Vec3::new(50.0, 0.0, 0.0));

        let short = home(Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0), 20.0);
        assert!(!short.passed);
        assert_eq!(short.position, Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_landing_on_target_counts_as_passing() {
        let step = home(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 60.0, 0.0), 50.0);
        assert!(step.passed);
        assert_eq!(step.position.y, 60.0);
    }

    #[test]
    fn test_first_crossed_picks_nearest_enemy() {
        let mut hash = SpatialHash::new(Vec2::ZERO, 100.0).expect("valid cell size");
        hash.insert(SpatialEntry::new(EntityId::from_raw(2), Vec2::new(80.0, 0.0), 10.0, Team::Red, UnitClass::Melee));
        hash.insert(SpatialEntry::new(EntityId::from_raw(3), Vec2::new(40.0, 5.0), 10.0, Team::Red, UnitClass::Range));
        hash.insert(SpatialEntry::new(EntityId::from_raw(4), Vec2::new(20.0, 0.0), 10.0, Team::Blue, UnitClass::Melee));

        let hit = first_crossed(&hash, Vec2::ZERO, Vec2::new(100.0, 0.0), 2.0, Team::Blue);
        assert_eq!(hit.map(|(id, _)| id.raw()), Some(3));
        let (_, t) = hit.expect("hit");
        assert!(t > 0.2 && t < 0.4);
    }

    #[test]
    fn test_homing_aims_at_projectile_center_offset() {
        let mut fx = Fixture::new();
        let archer = fx.spawn("archer", Team::Blue, 500.0, 500.0);
        let target = fx.spawn("knight", Team::Red, 600.0, 500.0);
        let mut stats = fx.registries.projectile("arrow").expect("arrow").clone();
        stats.center_offset = 35.0;
        let shot = launch(
            &mut fx.ctx(),
            archer,
            Team::Blue,
            ProjectileSpawn {
                stats,
                origin: Vec3::new(500.0, 500.0, 35.0),
                damage: 10.0,
                guidance: Guidance::Homing { target },
            },
        );

        run(&mut fx.ctx());
        let pos = fx.world.get_ref::<Position>(shot).expect("position");
        assert_eq!(pos.z, 35.0);
        assert!(pos.x > 500.0);
        assert_eq!(fx.world.get_ref::<Projectile>(shot).expect("projectile").center_offset, 35.0);
    }

    #[test]
    fn test_first_crossed_misses() {
        let mut hash = SpatialHash::new(Vec2::ZERO, 100.0).expect("valid cell size");
        hash.insert(SpatialEntry::new(EntityId::from_raw(2), Vec2::new(50.0, 60.0), 10.0, Team::Red, UnitClass::Melee));
        assert!(first_crossed(&hash, Vec2::ZERO, Vec2::new(100.0, 0.0), 2.0, Team::Blue).is_none());
    }
}
