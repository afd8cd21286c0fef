//! Combat: the per-unit state machine and the attack phase.

mod state;
mod system;

pub use state::{advance_frame, in_window, CombatEvent, CombatState};
pub use system::{apply_damage, run};

use crate::components::{Attack, SpecialCharge};

/// Drops an attacker's target after it died, converted or moved out of reach.
///
/// A channeling attacker that has not yet reached its damage frame keeps
/// its snapshot and finishes the swing. A stunned attacker resumes idle.
pub fn release_target(attack: &mut Attack, special: Option<&mut SpecialCharge>, channeling: bool) {
    if let Some(sp) = special {
        sp.charged = false;
        sp.target = None;
    }
    match attack.state {
        CombatState::Channeling => {},
        CombatState::Stunned => {
            attack.resume = CombatState::Idle;
            attack.target = None;
            attack.frame = 0;
        },
        state if channeling && state.advances_frames() && attack.frame <= attack.damage_frame => {
            attack.state = state.next(CombatEvent::Interrupted);
        },
        state => {
            attack.state = state.next(CombatEvent::TargetLost);
            attack.target = None;
            attack.frame = 0;
        },
    }
}
