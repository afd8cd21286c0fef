//! Healer for captured towers.

use tracing::debug;

use arena_common::{ArenaResult, EntityId};

use crate::components::{Health, Structure, StructureState};
use crate::events::SimEvent;
use crate::simulation::TickContext;

/// Conversion system: converting structures regain health at a fixed rate
/// and rejoin combat once full.
pub fn run(ctx: &mut TickContext<'_>) {
    let ids = ctx.members::<Structure>();
    ctx.for_each("conversion", ids, restore);
}

fn restore(ctx: &mut TickContext<'_>, id: EntityId) -> ArenaResult<()> {
    let mut structure = ctx.world.get::<Structure>(id)?;
    if structure.state != StructureState::Converting {
        return Ok(());
    }
    let mut health = ctx.world.get::<Health>(id)?;
    health.heal(ctx.config.conversion_heal_rate);
    ctx.world.set(id, health)?;
    if health.is_full() {
        structure.state = StructureState::Default;
        ctx.world.set(id, structure)?;
        debug!(entity = ?id, "Tower restored");
        ctx.events.publish(SimEvent::TowerRestored {
            match_id: ctx.match_id(),
            entity: id,
        });
    }
    Ok(())
}
