//! Attack phase.
//!
//! Runs after targeting and movement. Projectile impacts flagged during the
//! projectile phase are applied first, then every unit and structure
//! advances its attack-frame counter and fires on its damage frame.

use tracing::{debug, trace};

use arena_common::{edge_distance, ArenaResult, EntityId, StoreError, Team, UnitClass};

use super::state::{advance_frame, in_window, CombatEvent, CombatState};
use crate::attack::{AttackOutcome, Behavior, FireContext};
use crate::components::{
    Attack, Body, CrowdControl, Health, Position, Projectile, SpecialCharge, Structure, StructureState, TargetLock,
};
use crate::crowd_control;
use crate::events::SimEvent;
use crate::projectile;
use crate::simulation::TickContext;
use crate::targeting::{closest_enemy, SearchQuery};

/// Attack-phase system.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.members::<Projectile>();
    ctx.for_each("attack", ids, resolve_impact);
    let ids = ctx.members::<Attack>();
    ctx.for_each("attack", ids, attack);
}

/// Damages `target`, clamped at zero, and reports it.
///
/// A target that has already been removed takes no damage and is not an
/// error. Returns the damage dealt.
pub fn apply_damage(
    ctx: &mut TickContext<'_>,
    target: EntityId,
    amount: f32,
    source: Option<EntityId>,
) -> ArenaResult<f32> {
    let mut health = match ctx.world.get::<Health>(target) {
        Ok(health) => health,
        Err(StoreError::EntityNotFound(_)) => {
            trace!(entity = ?target, "Damage on vanished entity ignored");
            return Ok(0.0);
        },
        Err(e) => return Err(e.into()),
    };
    let dealt = health.damage(amount);
    ctx.world.set(target, health)?;
    if dealt > 0.0 {
        ctx.events.publish(SimEvent::Damaged {
            match_id: ctx.match_id(),
            entity: target,
            amount: dealt,
            source,
        });
    }
    Ok(dealt)
}

fn resolve_impact(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let mut shot = ctx.world.get::<Projectile>(id)?;
    if !shot.hit || shot.destroyed {
        return Ok(());
    }
    shot.destroyed = true;
    ctx.world.set(id, shot)?;
    if let Some(target) = shot.strike {
        apply_damage(ctx, target, shot.damage, Some(shot.owner))?;
    }
    Ok(())
}

/// Per-attacker facts that stay fixed for the tick.
#[derive(Debug, Clone, Copy)]
struct Attacker {
    id: EntityId,
    team: Team,
    class: UnitClass,
    radius: f32,
    position: Position,
}

fn attack(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    if ctx
        .world
        .get_ref::<Structure>(id)
        .is_ok_and(|s| s.state == StructureState::Converting)
    {
        return Ok(());
    }
    let mut attack = ctx.world.get::<Attack>(id)?;
    let held = ctx.world.get_ref::<CrowdControl>(id).is_ok_and(CrowdControl::is_held);
    if held {
        if attack.state != CombatState::Stunned {
            attack.resume = attack.state;
            attack.state = attack.state.next(CombatEvent::Stun);
            ctx.world.set(id, attack)?;
        }
        return Ok(());
    }
    if attack.state == CombatState::Stunned {
        attack.state = attack.state.next(CombatEvent::Recover(attack.resume));
        attack.resume = CombatState::Idle;
        if !attack.state.advances_frames() {
            attack.frame = 0;
        }
    }
    if !attack.state.advances_frames() {
        ctx.world.set(id, attack)?;
        return Ok(());
    }

    let body = ctx.world.get_ref::<Body>(id)?;
    let me = Attacker {
        id,
        team: body.team,
        class: body.class,
        radius: body.radius,
        position: ctx.world.get::<Position>(id)?,
    };
    let behavior = ctx.world.get::<Behavior>(id)?;
    let mut special = ctx.world.get::<SpecialCharge>(id).ok();

    if attack.state == CombatState::Engaged && attack.frame == 0 && behavior.special.is_some() {
        if let Some(sp) = special.as_mut().filter(|sp| sp.is_full()) {
            if let Some(lock) = charge_target(ctx, &me, &attack, sp) {
                sp.charged = true;
                sp.target = Some(lock);
                attack.state = attack.state.next(CombatEvent::Charge);
                debug!(entity = ?id, target = ?lock.id, "Special power charged");
            }
        }
    }

    let charged = attack.state == CombatState::Charging;
    let mut outcomes = Vec::new();
    let mut resolved = false;
    if charged {
        if let (Some(sp), Some(power)) = (special.as_ref(), behavior.special.as_ref()) {
            if in_window(attack.frame, sp.damage_frame, sp.damage_end_frame) {
                if let Some(lock) = sp.target.or(attack.target) {
                    let fire = fire_context(ctx, &me, lock, attack.damage);
                    outcomes = power.fire(&fire, attack.frame == sp.damage_frame);
                }
            }
        }
    } else if attack.frame == attack.damage_frame {
        if let Some(lock) = attack.target {
            let fire = fire_context(ctx, &me, lock, attack.damage);
            outcomes = behavior.attack.fire(&fire);
        }
        match attack.state {
            CombatState::Engaged => {
                if let Some(sp) = special.as_mut() {
                    sp.accrue();
                }
            },
            CombatState::Channeling => resolved = true,
            _ => {},
        }
    }

    if !outcomes.is_empty() {
        trace!(entity = ?id, frame = attack.frame, count = outcomes.len(), "Attack fired");
        apply_outcomes(ctx, &me, outcomes);
    }

    if resolved {
        attack.state = attack.state.next(CombatEvent::DamageResolved);
        attack.target = None;
        attack.frame = 0;
    } else {
        let cycle = match special.as_mut() {
            Some(sp) if charged => {
                if attack.frame >= sp.rate {
                    sp.spend();
                    attack.state = attack.state.next(CombatEvent::CastComplete);
                }
                sp.rate
            },
            _ => attack.rate,
        };
        attack.frame = advance_frame(attack.frame, cycle);
    }

    ctx.world.set(id, attack)?;
    if let Some(sp) = special {
        ctx.world.set(id, sp)?;
    }
    Ok(())
}

/// Picks the target for a charged cycle, or `None` to stay uncharged.
fn charge_target(ctx: &TickContext<'_>, me: &Attacker, attack: &Attack, sp: &SpecialCharge) -> Option<TargetLock> {
    let current = attack.target?;
    let here = me.position.xy();
    let reach = sp.attack_radius + ctx.config.range_tolerance;
    let fits = |lock: &TargetLock| edge_distance(here, me.radius, lock.position, lock.radius) <= reach;

    if sp.structure_targetable || current.class != UnitClass::Structure {
        return fits(&current).then_some(current);
    }
    let query = SearchQuery {
        origin: here,
        searcher: me.id,
        aggro_radius: attack.aggro_radius,
        team: me.team,
        class: me.class,
        structures: false,
    };
    let lock = TargetLock::from(&closest_enemy(&ctx.state.hash, &query)?);
    fits(&lock).then_some(lock)
}

fn fire_context<'a>(ctx: &'a TickContext<'_>, me: &Attacker, target: TargetLock, damage: f32) -> FireContext<'a> {
    FireContext {
        attacker: me.id,
        team: me.team,
        class: me.class,
        origin: me.position.xyz(),
        facing: me.position.rotation,
        target,
        damage,
        hash: &ctx.state.hash,
    }
}

fn apply_outcomes(ctx: &mut TickContext<'_>, me: &Attacker, outcomes: Vec<AttackOutcome>) {
    for outcome in outcomes {
        let result = match outcome {
            AttackOutcome::Damage { target, amount } => apply_damage(ctx, target, amount, Some(me.id)).map(|_| ()),
            AttackOutcome::Projectile(spawn) => {
                projectile::launch(ctx, me.id, me.team, spawn);
                Ok(())
            },
            AttackOutcome::Effect(kind) => crowd_control::spawn_effect(ctx, me.id, me.team, kind),
            AttackOutcome::KnockBack { target, from, distance } => {
                crowd_control::knock_back(ctx, target, from, distance)
            },
        };
        if let Err(e) = result {
            ctx.skip("attack", me.id, e);
        }
    }
}
