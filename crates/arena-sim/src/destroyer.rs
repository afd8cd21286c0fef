//! End-of-tick cleanup.
//!
//! Dead units leave the store and the spatial hash together, and anyone
//! still locked onto them lets go. Dead towers change sides instead of
//! dying; a dead base ends the match. Spent projectiles and expired effects
//! are removed last.

use tracing::{debug, info};

use arena_common::{ArenaResult, EntityId};

use crate::combat::release_target;
use crate::components::{
    Attack, Behavior, Body, Effect, Health, Position, Projectile, SpecialCharge, Structure, StructureKind,
    StructureState,
};
use crate::events::SimEvent;
use crate::simulation::TickContext;
use crate::spatial_hash::SpatialEntry;

/// Destroyer system.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.members::<Health>();
    ctx.for_each("destroyer", ids, reap);
    let ids = ctx.members::<Projectile>();
    ctx.for_each("destroyer", ids, sweep_projectile);
    let ids = ctx.effects();
    ctx.for_each("destroyer", ids, sweep_effect);
}

fn reap(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    if !ctx.world.get_ref::<Health>(id)?.is_dead() {
        return Ok(());
    }
    match ctx.world.get::<Structure>(id).ok() {
        Some(structure) if structure.kind == StructureKind::Tower => convert(ctx, id, structure),
        Some(_) => {
            let team = ctx.world.get_ref::<Body>(id)?.team;
            if ctx.state.winner.is_none() {
                let winner = team.opponent();
                ctx.state.winner = Some(winner);
                info!(match_id = %ctx.match_id(), ?winner, "Base destroyed");
                ctx.events.publish(SimEvent::MatchEnded {
                    match_id: ctx.match_id(),
                    winner,
                });
            }
            destroy(ctx, id)
        },
        None => destroy(ctx, id),
    }
}

/// Flips a fallen tower to the other team at half health.
fn convert(ctx: &mut TickContext<'_>, id: EntityId, mut structure: Structure) -> ArenaResult<()> {
    let mut body = ctx.world.get::<Body>(id)?;
    let at = ctx.world.get_ref::<Position>(id)?.xy();
    let mut health = ctx.world.get::<Health>(id)?;

    ctx.state.hash.remove(id, at, body.radius);
    body.team = body.team.opponent();
    health.set(health.max / 2.0);
    structure.state = StructureState::Converting;
    ctx.world.set(id, health)?;
    ctx.world.set(id, structure)?;
    if let Ok(attack) = ctx.world.get_mut::<Attack>(id) {
        attack.reset();
    }
    ctx.state
        .hash
        .insert(SpatialEntry::new(id, at, body.radius, body.team, body.class));
    let team = body.team;
    ctx.world.set(id, body)?;

    release_attackers(ctx, id)?;
    info!(entity = ?id, ?team, "Tower converted");
    ctx.events.publish(SimEvent::TowerConverted {
        match_id: ctx.match_id(),
        entity: id,
        team,
    });
    Ok(())
}

fn destroy(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let body = ctx.world.get::<Body>(id)?;
    if let Ok(pos) = ctx.world.get_ref::<Position>(id) {
        let at = pos.xy();
        ctx.state.hash.remove(id, at, body.radius);
    }
    release_attackers(ctx, id)?;
    ctx.state.mark_removed(body.uid);
    ctx.world.remove(id)?;
    debug!(entity = ?id, uid = %body.uid, name = %body.name, "Destroyed");
    ctx.events.publish(SimEvent::Destroyed {
        match_id: ctx.match_id(),
        entity: id,
        uid: body.uid,
    });
    Ok(())
}

/// Makes every attacker locked onto `target` let go of it.
fn release_attackers(ctx: &mut TickContext<'_>, target: EntityId) -> ArenaResult<()> {
    let attackers: Vec<EntityId> = ctx
        .members::<Attack>()
        .into_iter()
        .filter(|a| {
            let locked = ctx
                .world
                .get_ref::<Attack>(*a)
                .is_ok_and(|at| at.target_id() == Some(target));
            let charged = ctx
                .world
                .get_ref::<SpecialCharge>(*a)
                .is_ok_and(|sp| sp.target.is_some_and(|t| t.id == target));
            locked || charged
        })
        .collect();

    for id in attackers {
        let mut attack = ctx.world.get::<Attack>(id)?;
        let mut special = ctx.world.get::<SpecialCharge>(id).ok();
        let channeling = ctx
            .world
            .get_ref::<Behavior>(id)
            .is_ok_and(|b| b.attack.is_channeling());
        release_target(&mut attack, special.as_mut(), channeling);
        ctx.world.set(id, attack)?;
        if let Some(sp) = special {
            ctx.world.set(id, sp)?;
        }
    }
    Ok(())
}

fn sweep_projectile(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    if !ctx.world.get_ref::<Projectile>(id)?.destroyed {
        return Ok(());
    }
    let uid = ctx.world.get_ref::<Body>(id)?.uid;
    ctx.state.mark_removed(uid);
    ctx.world.remove(id)?;
    Ok(())
}

fn sweep_effect(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    if ctx.world.get_ref::<Effect>(id)?.expired {
        ctx.world.remove(id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatState;
    use crate::components::TargetLock;
    use crate::testkit::Fixture;
    use arena_common::{Team, UnitClass};
    use glam::Vec2;

    fn kill(f: &mut Fixture, id: EntityId) {
        f.world.get_mut::<Health>(id).expect("health").set(0.0);
    }

    #[test]
    fn test_tower_converts() {
        let mut f = Fixture::new();
        let tower = f.spawn("tower", Team::Red, 1600.0, 250.0);
        kill(&mut f, tower);
        f.events.drain();
        run(&mut f.ctx());

        assert_eq!(f.world.get_ref::<Body>(tower).expect("body").team, Team::Blue);
        assert_eq!(f.world.get_ref::<Health>(tower).expect("health").current, 750.0);
        assert_eq!(
            f.world.get_ref::<Structure>(tower).expect("structure").state,
            StructureState::Converting
        );
        let indexed = f.state.hash.query_entries(Vec2::new(1600.0, 250.0), 1.0);
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].team, Team::Blue);
        assert!(matches!(
            f.events.drain().as_slice(),
            [SimEvent::TowerConverted { team: Team::Blue, .. }]
        ));
    }

    #[test]
    fn test_dead_unit_removed_and_attackers_released() {
        let mut f = Fixture::new();
        let archer = f.spawn("archer", Team::Blue, 500.0, 500.0);
        let knight = f.spawn("knight", Team::Red, 600.0, 500.0);
        let attack = f.world.get_mut::<Attack>(archer).expect("attack");
        attack.state = CombatState::Engaged;
        attack.frame = 3;
        attack.target = Some(TargetLock {
            id: knight,
            position: Vec2::new(600.0, 500.0),
            radius: 20.0,
            class: UnitClass::Melee,
        });
        let uid = f.world.get_ref::<Body>(knight).expect("body").uid;
        kill(&mut f, knight);
        run(&mut f.ctx());

        assert!(!f.world.contains(knight));
        assert!(f.state.hash.query_circle(Vec2::new(600.0, 500.0), 1.0).is_empty());
        let attack = f.world.get_ref::<Attack>(archer).expect("attack");
        assert_eq!(attack.state, CombatState::Idle);
        assert!(attack.target.is_none());
        for team in Team::ALL {
            assert!(f.state.player(team).pending_removals.contains(&uid));
        }
    }

    #[test]
    fn test_base_death_ends_match() {
        let mut f = Fixture::new();
        let base = f.spawn("base", Team::Red, 1900.0, 500.0);
        kill(&mut f, base);
        run(&mut f.ctx());

        assert_eq!(f.state.winner, Some(Team::Blue));
        assert!(!f.world.contains(base));
        assert!(f
            .events
            .drain()
            .iter()
            .any(|e| matches!(e, SimEvent::MatchEnded { winner: Team::Blue, .. })));
    }
}
