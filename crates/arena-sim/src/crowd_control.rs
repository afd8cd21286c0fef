//! Crowd control and timed effects.
//!
//! Stuns are counted rather than flagged so overlapping sources stack and
//! unwind cleanly. Heal-over-time, burns and knock-up arcs live on their own
//! effect entities and are ticked here until they expire; the destroyer
//! removes them afterwards.

use glam::Vec2;
use tracing::trace;

use arena_common::{direction_to, rotate, ArenaResult, EntityId, StoreError, Team};

use crate::combat::apply_damage;
use crate::components::{Body, CrowdControl, Effect, EffectKind, Health, Movement, Position};
use crate::events::SimEvent;
use crate::movement::resolve_step;
use crate::registry::Map;
use crate::simulation::TickContext;
use crate::spatial_hash::SpatialEntry;

/// Attaches a timed effect fired by `source`.
///
/// Stun counters and the airborne flag are applied immediately. A unit
/// that is already in the air is not knocked up again.
pub fn spawn_effect(ctx: &mut TickContext<'_>, source: EntityId, team: Team, mut kind: EffectKind) -> ArenaResult<()> {
    match &mut kind {
        EffectKind::Stun { targets, .. } => {
            targets.retain(|t| ctx.world.has::<CrowdControl>(*t));
            if targets.is_empty() {
                return Ok(());
            }
            for target in targets.iter() {
                ctx.world.get_mut::<CrowdControl>(*target)?.stun += 1;
            }
        },
        EffectKind::KnockUp(arc) => {
            let z = ctx.world.get_ref::<Position>(arc.target)?.z;
            let cc = ctx.world.get_mut::<CrowdControl>(arc.target)?;
            if cc.airborne {
                return Ok(());
            }
            cc.airborne = true;
            arc.base_z = z;
        },
        EffectKind::HealOverTime { .. } | EffectKind::Burn { .. } => {},
    }
    let match_id = ctx.match_id();
    let id = ctx
        .world
        .create()
        .with(Effect {
            match_id,
            source,
            team,
            elapsed: 0,
            expired: false,
            kind,
        })
        .id();
    trace!(effect = ?id, source = ?source, "Effect attached");
    Ok(())
}

/// Pushes `target` `distance` away from `from`.
///
/// Structures and other immobile bodies are immune. A landing spot outside
/// the map is pulled back toward the target, then rotated, until one fits.
/// The push goes through normal collision resolution and costs the target
/// its next movement tick.
pub fn knock_back(ctx: &mut TickContext<'_>, target: EntityId, from: Vec2, distance: f32) -> ArenaResult<()> {
    let body = match ctx.world.get_ref::<Body>(target) {
        Ok(body) => body,
        Err(StoreError::EntityNotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if !body.class.is_mobile() {
        return Ok(());
    }
    let (team, class, radius) = (body.team, body.class, body.radius);
    let mut pos = ctx.world.get::<Position>(target)?;
    let here = pos.xy();

    let mut direction = direction_to(from, here);
    if direction == Vec2::ZERO {
        direction = -Vec2::from_angle(pos.rotation);
    }
    let desired = landing(ctx.map, here, direction * distance);
    let mover = SpatialEntry::new(target, here, radius, team, class);
    let end = resolve_step(ctx, mover, desired)?;

    pos.set_xy(end);
    ctx.world.set(target, pos)?;
    let to_base = ctx.map.distance_to_enemy_base(end, team);
    if let Ok(m) = ctx.world.get_mut::<Movement>(target) {
        m.distance_to_base = to_base;
    }
    if let Ok(cc) = ctx.world.get_mut::<CrowdControl>(target) {
        cc.knocked_back = true;
    }
    trace!(entity = ?target, from = ?here, to = ?end, "Knocked back");
    Ok(())
}

const LANDING_FRACTIONS: u32 = 10;
const LANDING_ROTATIONS: u32 = 6;

fn landing(map: &Map, here: Vec2, offset: Vec2) -> Vec2 {
    let full = here + offset;
    if map.contains(full) {
        return full;
    }
    for i in (1..LANDING_FRACTIONS).rev() {
        let p = here + offset * (i as f32 / LANDING_FRACTIONS as f32);
        if map.contains(p) {
            return p;
        }
    }
    let step = 30f32.to_radians();
    for k in 1..=LANDING_ROTATIONS {
        for side in [1.0, -1.0] {
            let p = here + rotate(offset, side * k as f32 * step);
            if map.contains(p) {
                return p;
            }
        }
    }
    here
}

/// Effect system.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.effects();
    ctx.for_each("effects", ids, tick_effect);
}

fn tick_effect(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let mut effect = ctx.world.get::<Effect>(id)?;
    if effect.expired {
        return Ok(());
    }
    effect.elapsed += 1;
    let elapsed = effect.elapsed;

    match &mut effect.kind {
        EffectKind::Stun { targets, duration } => {
            if elapsed >= *duration {
                for target in targets.iter() {
                    if let Ok(cc) = ctx.world.get_mut::<CrowdControl>(*target) {
                        cc.stun = cc.stun.saturating_sub(1);
                    }
                }
                effect.expired = true;
            }
        },
        EffectKind::HealOverTime {
            center,
            radius,
            amount,
            duration,
        } => {
            let allies: Vec<EntityId> = ctx
                .state
                .hash
                .query_entries(*center, *radius)
                .into_iter()
                .filter(|e| e.team == effect.team)
                .map(|e| e.id)
                .collect();
            for ally in allies {
                heal(ctx, ally, *amount)?;
            }
            effect.expired = elapsed >= *duration;
        },
        EffectKind::Burn {
            target,
            amount,
            duration,
        } => {
            if ctx.world.contains(*target) {
                apply_damage(ctx, *target, *amount, Some(effect.source))?;
                effect.expired = elapsed >= *duration;
            } else {
                effect.expired = true;
            }
        },
        EffectKind::KnockUp(arc) => {
            let Ok(mut pos) = ctx.world.get::<Position>(arc.target) else {
                effect.expired = true;
                ctx.world.set(id, effect)?;
                return Ok(());
            };
            let landed = arc.step();
            pos.z = arc.z();
            ctx.world.set(arc.target, pos)?;
            if landed {
                if let Ok(cc) = ctx.world.get_mut::<CrowdControl>(arc.target) {
                    cc.airborne = false;
                }
                apply_damage(ctx, arc.target, arc.damage, Some(effect.source))?;
                effect.expired = true;
            }
        },
    }
    ctx.world.set(id, effect)?;
    Ok(())
}

fn heal(ctx: &mut TickContext<'_>, target: EntityId, amount: f32) -> ArenaResult<()> {
    let mut health = ctx.world.get::<Health>(target)?;
    let restored = health.heal(amount);
    ctx.world.set(target, health)?;
    if restored > 0.0 {
        ctx.events.publish(SimEvent::Healed {
            match_id: ctx.match_id(),
            entity: target,
            amount: restored,
        });
    }
    Ok(())
}
