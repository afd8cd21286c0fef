//! Attack behaviors.
//!
//! A unit's normal attack and special power are resolved from its stat block
//! once, at spawn, into a [`Behavior`] component. Firing never looks at unit
//! names; it turns the behavior plus a [`FireContext`] into a list of
//! [`AttackOutcome`]s that the combat system applies to the store.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use arena_common::{direction_to, rotate, Area, EntityId, Rect, Team, Triangle, UnitClass};

use crate::components::{EffectKind, Guidance, KnockUpArc, TargetLock};
use crate::registry::ProjectileStats;
use crate::spatial_hash::{SpatialEntry, SpatialHash};

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

/// Ground shape swept by an area attack, anchored at the attacker and
/// pointing at the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AreaShape {
    /// Rectangle `length` long and `width` wide.
    Line {
        /// Reach along the aim direction
        length: f32,
        /// Full width across the aim direction
        width: f32,
    },
    /// Triangle opening `spread_deg` degrees.
    Cone {
        /// Side length
        length: f32,
        /// Opening angle in degrees
        spread_deg: f32,
    },
}

impl AreaShape {
    /// Checks that the shape has positive extent.
    pub fn validate(&self) -> Result<(), &'static str> {
        let ok = match *self {
            Self::Line { length, width } => positive(length) && positive(width),
            Self::Cone { length, spread_deg } => positive(length) && positive(spread_deg) && spread_deg < 180.0,
        };
        if ok {
            Ok(())
        } else {
            Err("area shape needs a positive length, width or spread")
        }
    }

    /// Places the shape at `origin` facing `direction`.
    #[must_use]
    pub fn place(&self, origin: Vec2, direction: Vec2) -> SweepArea {
        match *self {
            Self::Line { length, width } => SweepArea::Rect(Rect::along(origin, direction, length, width)),
            Self::Cone { length, spread_deg } => {
                SweepArea::Triangle(Triangle::cone(origin, direction, length, spread_deg.to_radians()))
            },
        }
    }
}

/// A placed [`AreaShape`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepArea {
    /// Line sweep
    Rect(Rect),
    /// Cone sweep
    Triangle(Triangle),
}

impl Area for SweepArea {
    fn vertices(&self) -> &[Vec2] {
        match self {
            Self::Rect(r) => r.vertices(),
            Self::Triangle(t) => t.vertices(),
        }
    }
}

/// Normal attack of a unit or structure.
///
/// `P` is the projectile reference: a registry name while loading, the
/// resolved [`ProjectileStats`] once attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttackBehavior<P = ProjectileStats> {
    /// Instant damage to the target.
    Melee,
    /// Instant damage from a tower or base.
    Structure,
    /// Homing projectile at the target.
    Range {
        /// Projectile fired
        projectile: P,
    },
    /// Sustained area attack that finishes its damage tick even if the
    /// target dies mid-swing.
    Channel {
        /// Area swept on each damage tick
        shape: AreaShape,
    },
    /// Area attack on each damage tick.
    Sweep {
        /// Area swept on each damage tick
        shape: AreaShape,
    },
    /// Fan of straight projectiles.
    Volley {
        /// Projectile fired
        projectile: P,
        /// Number of projectiles
        count: u32,
        /// Total fan angle in degrees
        spread_deg: f32,
    },
}

impl<P> AttackBehavior<P> {
    /// Checks shape and volley parameters.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Channel { shape } | Self::Sweep { shape } => shape.validate(),
            Self::Volley { count: 0, .. } => Err("volley count must be positive"),
            Self::Volley { spread_deg, .. } if !(spread_deg.is_finite() && *spread_deg >= 0.0) => {
                Err("volley spread must not be negative")
            },
            _ => Ok(()),
        }
    }

    /// Whether target loss should let the pending damage tick resolve.
    #[must_use]
    pub fn is_channeling(&self) -> bool {
        matches!(self, Self::Channel { .. })
    }

    /// Replaces projectile references using `lookup`.
    pub fn resolve<Q, E>(self, mut lookup: impl FnMut(P) -> Result<Q, E>) -> Result<AttackBehavior<Q>, E> {
        Ok(match self {
            Self::Melee => AttackBehavior::Melee,
            Self::Structure => AttackBehavior::Structure,
            Self::Range { projectile } => AttackBehavior::Range {
                projectile: lookup(projectile)?,
            },
            Self::Channel { shape } => AttackBehavior::Channel { shape },
            Self::Sweep { shape } => AttackBehavior::Sweep { shape },
            Self::Volley {
                projectile,
                count,
                spread_deg,
            } => AttackBehavior::Volley {
                projectile: lookup(projectile)?,
                count,
                spread_deg,
            },
        })
    }
}

/// Charged attack unlocked when special-power charge is full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecialPower<P = ProjectileStats> {
    /// Stun pulse on enemies around the target.
    Stun {
        /// Pulse radius around the target
        radius: f32,
        /// Ticks the stun lasts
        ticks: u32,
    },
    /// Heal allies around the caster every tick.
    HealOverTime {
        /// Heal radius around the caster
        radius: f32,
        /// Health restored per tick
        amount: f32,
        /// Ticks the effect lasts
        ticks: u32,
    },
    /// Damage the target every tick.
    Burn {
        /// Damage per tick
        amount: f32,
        /// Ticks the effect lasts
        ticks: u32,
    },
    /// Launch enemies around the target into the air.
    KnockUp {
        /// Radius around the target
        radius: f32,
        /// Apex height
        height: f32,
        /// Vertical speed per tick
        speed: f32,
        /// Damage applied on landing
        damage: f32,
    },
    /// Push the target away from the caster.
    KnockBack {
        /// Push distance
        distance: f32,
        /// Damage on hit
        damage: f32,
    },
    /// Area damage on every frame of the cast window.
    Sweep {
        /// Area swept
        shape: AreaShape,
        /// Damage per frame
        damage: f32,
    },
    /// Fan of straight projectiles.
    Volley {
        /// Projectile fired
        projectile: P,
        /// Number of projectiles
        count: u32,
        /// Total fan angle in degrees
        spread_deg: f32,
        /// Damage per projectile
        damage: f32,
    },
}

impl<P> SpecialPower<P> {
    /// Checks the power's parameters.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Stun { radius, ticks } => {
                if !positive(*radius) {
                    return Err("stun radius must be positive");
                }
                if *ticks == 0 {
                    return Err("stun ticks must be positive");
                }
            },
            Self::HealOverTime { radius, amount, ticks } => {
                if !positive(*radius) || !positive(*amount) {
                    return Err("heal radius and amount must be positive");
                }
                if *ticks == 0 {
                    return Err("heal ticks must be positive");
                }
            },
            Self::Burn { amount, ticks } => {
                if !positive(*amount) || *ticks == 0 {
                    return Err("burn amount and ticks must be positive");
                }
            },
            Self::KnockUp {
                radius,
                height,
                speed,
                damage,
            } => {
                if !positive(*radius) {
                    return Err("knock-up radius must be positive");
                }
                if !positive(*speed) {
                    return Err("knock-up speed must be positive");
                }
                if !(height.is_finite() && *height >= 0.0) || *damage < 0.0 {
                    return Err("knock-up height and damage must not be negative");
                }
            },
            Self::KnockBack { distance, damage } => {
                if !positive(*distance) || *damage < 0.0 {
                    return Err("knock-back needs a positive distance and non-negative damage");
                }
            },
            Self::Sweep { shape, .. } => shape.validate()?,
            Self::Volley { count, spread_deg, .. } => {
                if *count == 0 {
                    return Err("volley count must be positive");
                }
                if !(spread_deg.is_finite() && *spread_deg >= 0.0) {
                    return Err("volley spread must not be negative");
                }
            },
        }
        Ok(())
    }

    /// Replaces projectile references using `lookup`.
    pub fn resolve<Q, E>(self, mut lookup: impl FnMut(P) -> Result<Q, E>) -> Result<SpecialPower<Q>, E> {
        Ok(match self {
            Self::Stun { radius, ticks } => SpecialPower::Stun { radius, ticks },
            Self::HealOverTime { radius, amount, ticks } => SpecialPower::HealOverTime { radius, amount, ticks },
            Self::Burn { amount, ticks } => SpecialPower::Burn { amount, ticks },
            Self::KnockUp {
                radius,
                height,
                speed,
                damage,
            } => SpecialPower::KnockUp {
                radius,
                height,
                speed,
                damage,
            },
            Self::KnockBack { distance, damage } => SpecialPower::KnockBack { distance, damage },
            Self::Sweep { shape, damage } => SpecialPower::Sweep { shape, damage },
            Self::Volley {
                projectile,
                count,
                spread_deg,
                damage,
            } => SpecialPower::Volley {
                projectile: lookup(projectile)?,
                count,
                spread_deg,
                damage,
            },
        })
    }
}

/// Resolved attack capabilities of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Behavior {
    /// Normal attack
    pub attack: AttackBehavior,
    /// Charged attack, if the unit has one
    pub special: Option<SpecialPower>,
}

/// Everything an attack needs to know about the moment it fires.
#[derive(Debug, Clone, Copy)]
pub struct FireContext<'a> {
    /// Attacking entity
    pub attacker: EntityId,
    /// Attacker's team
    pub team: Team,
    /// Attacker's class
    pub class: UnitClass,
    /// Attacker's position
    pub origin: Vec3,
    /// Attacker's facing in radians
    pub facing: f32,
    /// Locked target
    pub target: TargetLock,
    /// Base damage of the attack
    pub damage: f32,
    /// Match spatial index
    pub hash: &'a SpatialHash,
}

impl FireContext<'_> {
    /// Ground direction toward the target, falling back to the facing.
    #[must_use]
    pub fn aim(&self) -> Vec2 {
        let dir = direction_to(self.origin.truncate(), self.target.position);
        if dir == Vec2::ZERO {
            rotate(Vec2::X, self.facing)
        } else {
            dir
        }
    }

    fn is_enemy(&self, entry: &SpatialEntry) -> bool {
        entry.team != self.team && entry.id != self.attacker && self.class.can_target(entry.class)
    }

    fn enemies_around(&self, center: Vec2, radius: f32) -> Vec<SpatialEntry> {
        self.hash
            .query_entries(center, radius)
            .into_iter()
            .filter(|e| self.is_enemy(e))
            .collect()
    }
}

/// A projectile to be created by the combat system.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawn {
    /// Projectile type
    pub stats: ProjectileStats,
    /// Launch point
    pub origin: Vec3,
    /// Damage on impact
    pub damage: f32,
    /// Homing or straight flight
    pub guidance: Guidance,
}

/// What firing an attack does to the world.
#[derive(Debug, Clone, PartialEq)]
pub enum AttackOutcome {
    /// Direct health change on an entity.
    Damage {
        /// Entity hit
        target: EntityId,
        /// Damage dealt
        amount: f32,
    },
    /// A new projectile.
    Projectile(ProjectileSpawn),
    /// A new timed-effect entity.
    Effect(EffectKind),
    /// Push an entity away from a point.
    KnockBack {
        /// Entity pushed
        target: EntityId,
        /// Point pushed away from
        from: Vec2,
        /// Push distance
        distance: f32,
    },
}

impl AttackBehavior {
    /// Fires the normal attack.
    #[must_use]
    pub fn fire(&self, ctx: &FireContext<'_>) -> Vec<AttackOutcome> {
        match self {
            Self::Melee | Self::Structure => vec![AttackOutcome::Damage {
                target: ctx.target.id,
                amount: ctx.damage,
            }],
            Self::Range { projectile } => vec![AttackOutcome::Projectile(ProjectileSpawn {
                stats: projectile.clone(),
                origin: ctx.origin + Vec3::Z * projectile.center_offset,
                damage: ctx.damage,
                guidance: Guidance::Homing {
                    target: ctx.target.id,
                },
            })],
            Self::Channel { shape } | Self::Sweep { shape } => sweep(ctx, shape, ctx.damage),
            Self::Volley {
                projectile,
                count,
                spread_deg,
            } => volley(ctx, projectile, *count, *spread_deg, ctx.damage),
        }
    }
}

impl SpecialPower {
    /// Fires the charged attack on one frame of its damage window.
    ///
    /// Effects that spawn an entity or a projectile only do so on the first
    /// frame; area damage repeats on every frame.
    #[must_use]
    pub fn fire(&self, ctx: &FireContext<'_>, first_frame: bool) -> Vec<AttackOutcome> {
        match self {
            Self::Sweep { shape, damage } => sweep(ctx, shape, *damage),
            _ if !first_frame => Vec::new(),
            Self::Stun { radius, ticks } => {
                let mut targets: Vec<EntityId> = ctx
                    .enemies_around(ctx.target.position, *radius)
                    .into_iter()
                    .filter(|e| e.class.is_mobile())
                    .map(|e| e.id)
                    .collect();
                if ctx.target.class.is_mobile() && !targets.contains(&ctx.target.id) {
                    targets.insert(0, ctx.target.id);
                }
                vec![AttackOutcome::Effect(EffectKind::Stun {
                    targets,
                    duration: *ticks,
                })]
            },
            Self::HealOverTime { radius, amount, ticks } => vec![AttackOutcome::Effect(EffectKind::HealOverTime {
                center: ctx.origin.truncate(),
                radius: *radius,
                amount: *amount,
                duration: *ticks,
            })],
            Self::Burn { amount, ticks } => vec![AttackOutcome::Effect(EffectKind::Burn {
                target: ctx.target.id,
                amount: *amount,
                duration: *ticks,
            })],
            Self::KnockUp {
                radius,
                height,
                speed,
                damage,
            } => ctx
                .enemies_around(ctx.target.position, *radius)
                .into_iter()
                .filter(|e| matches!(e.class, UnitClass::Melee | UnitClass::Range))
                .map(|e| AttackOutcome::Effect(EffectKind::KnockUp(KnockUpArc::new(e.id, *height, *speed, *damage))))
                .collect(),
            Self::KnockBack { distance, damage } => vec![
                AttackOutcome::Damage {
                    target: ctx.target.id,
                    amount: *damage,
                },
                AttackOutcome::KnockBack {
                    target: ctx.target.id,
                    from: ctx.origin.truncate(),
                    distance: *distance,
                },
            ],
            Self::Volley {
                projectile,
                count,
                spread_deg,
                damage,
            } => volley(ctx, projectile, *count, *spread_deg, *damage),
        }
    }
}

fn sweep(ctx: &FireContext<'_>, shape: &AreaShape, damage: f32) -> Vec<AttackOutcome> {
    let area = shape.place(ctx.origin.truncate(), ctx.aim());
    ctx.hash
        .query_area(&area)
        .into_iter()
        .filter(|e| ctx.is_enemy(e))
        .map(|e| AttackOutcome::Damage {
            target: e.id,
            amount: damage,
        })
        .collect()
}

fn volley(
    ctx: &FireContext<'_>,
    projectile: &ProjectileStats,
    count: u32,
    spread_deg: f32,
    damage: f32,
) -> Vec<AttackOutcome> {
    let aim = ctx.aim();
    let spread = spread_deg.to_radians();
    let origin = ctx.origin + Vec3::Z * projectile.center_offset;
    (0..count)
        .map(|i| {
            let angle = if count <= 1 {
                0.0
            } else {
                -spread * 0.5 + spread * i as f32 / (count - 1) as f32
            };
            AttackOutcome::Projectile(ProjectileSpawn {
                stats: projectile.clone(),
                origin,
                damage,
                guidance: Guidance::Straight {
                    direction: rotate(aim, angle),
                    remaining: projectile.range,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrow() -> ProjectileStats {
        ProjectileStats {
            name: "arrow".into(),
            speed: 40.0,
            radius: 4.0,
            center_offset: 20.0,
            range: 300.0,
        }
    }

    fn hash_with(entries: &[SpatialEntry]) -> SpatialHash {
        let mut hash = SpatialHash::new(Vec2::ZERO, 100.0).expect("valid cell size");
        for e in entries {
            hash.insert(*e);
        }
        hash
    }

    fn lock(id: u64, x: f32, y: f32) -> TargetLock {
        TargetLock {
            id: EntityId::from_raw(id),
            position: Vec2::new(x, y),
            radius: 20.0,
            class: UnitClass::Melee,
        }
    }

    fn ctx<'a>(hash: &'a SpatialHash, target: TargetLock) -> FireContext<'a> {
        FireContext {
            attacker: EntityId::from_raw(1),
            team: Team::Blue,
            class: UnitClass::Range,
            origin: Vec3::ZERO,
            facing: 0.0,
            target,
            damage: 50.0,
            hash,
        }
    }

    #[test]
    fn test_melee_hits_target() {
        let hash = hash_with(&[]);
        let out = AttackBehavior::Melee.fire(&ctx(&hash, lock(2, 30.0, 0.0)));
        assert_eq!(
            out,
            vec![AttackOutcome::Damage {
                target: EntityId::from_raw(2),
                amount: 50.0
            }]
        );
    }

    #[test]
    fn test_range_spawns_homing_projectile() {
        let hash = hash_with(&[]);
        let out = AttackBehavior::Range { projectile: arrow() }.fire(&ctx(&hash, lock(2, 200.0, 0.0)));
        match out.as_slice() {
            [AttackOutcome::Projectile(spawn)] => {
                assert_eq!(spawn.origin.z, 20.0);
                assert_eq!(
                    spawn.guidance,
                    Guidance::Homing {
                        target: EntityId::from_raw(2)
                    }
                );
            },
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_volley_fans_projectiles() {
        let hash = hash_with(&[]);
        let behavior = AttackBehavior::Volley {
            projectile: arrow(),
            count: 3,
            spread_deg: 90.0,
        };
        let out = behavior.fire(&ctx(&hash, lock(2, 100.0, 0.0)));
        let dirs: Vec<Vec2> = out
            .iter()
            .filter_map(|o| match o {
                AttackOutcome::Projectile(ProjectileSpawn {
                    guidance: Guidance::Straight { direction, .. },
                    ..
                }) => Some(*direction),
                _ => None,
            })
            .collect();
        assert_eq!(dirs.len(), 3);
        assert!((dirs[1] - Vec2::X).length() < 1e-4);
        assert!((dirs[0].angle_between(dirs[2]).abs() - std::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_sweep_hits_enemies_in_line_only() {
        let hash = hash_with(&[
            SpatialEntry::new(EntityId::from_raw(2), Vec2::new(60.0, 0.0), 10.0, Team::Red, UnitClass::Melee),
            SpatialEntry::new(EntityId::from_raw(3), Vec2::new(60.0, 80.0), 10.0, Team::Red, UnitClass::Melee),
            SpatialEntry::new(EntityId::from_raw(4), Vec2::new(90.0, 0.0), 10.0, Team::Blue, UnitClass::Melee),
        ]);
        let behavior = AttackBehavior::Channel {
            shape: AreaShape::Line {
                length: 150.0,
                width: 40.0,
            },
        };
        let out = behavior.fire(&ctx(&hash, lock(2, 60.0, 0.0)));
        assert_eq!(
            out,
            vec![AttackOutcome::Damage {
                target: EntityId::from_raw(2),
                amount: 50.0
            }]
        );
    }

    #[test]
    fn test_spawn_powers_only_fire_on_first_frame() {
        let hash = hash_with(&[]);
        let power = SpecialPower::Burn { amount: 5.0, ticks: 10 };
        let c = ctx(&hash, lock(2, 30.0, 0.0));
        assert_eq!(power.fire(&c, true).len(), 1);
        assert!(power.fire(&c, false).is_empty());
    }

    #[test]
    fn test_stun_always_includes_target() {
        let hash = hash_with(&[SpatialEntry::new(
            EntityId::from_raw(3),
            Vec2::new(40.0, 0.0),
            10.0,
            Team::Red,
            UnitClass::Range,
        )]);
        let power: SpecialPower = SpecialPower::Stun { radius: 50.0, ticks: 10 };
        let out = power.fire(&ctx(&hash, lock(2, 30.0, 0.0)), true);
        match out.as_slice() {
            [AttackOutcome::Effect(EffectKind::Stun { targets, duration })] => {
                assert_eq!(*duration, 10);
                assert_eq!(targets, &vec![EntityId::from_raw(2), EntityId::from_raw(3)]);
            },
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_projectile() {
        let behavior: AttackBehavior<String> = AttackBehavior::Range {
            projectile: "ghost".into(),
        };
        let resolved: Result<AttackBehavior, String> = behavior.resolve(Err);
        assert_eq!(resolved, Err("ghost".to_string()));
    }
}
