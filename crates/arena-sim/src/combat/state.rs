//! Combat state machine.
//!
//! A unit's combat lifecycle is an explicit [`CombatState`] driven by
//! [`CombatEvent`]s. Transitions are pure, so they can be tested without a
//! store. The attack-frame counter lives next to the state on the
//! [`Attack`](crate::components::Attack) component and is advanced with
//! [`advance_frame`].

use serde::{Deserialize, Serialize};

/// Where a unit is in its combat lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatState {
    /// No target. Searches every tick and follows the lane.
    #[default]
    Idle,
    /// Target spotted inside aggro range but outside attack range.
    Approaching,
    /// Attacking with the normal attack. Frames advance.
    Engaged,
    /// Attacking with a charged special power. Frames advance.
    Charging,
    /// Target lost mid-swing; finishing the pending damage tick.
    Channeling,
    /// Stun or knock-up is holding the unit.
    Stunned,
}

/// Inputs that move a unit between [`CombatState`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatEvent {
    /// An enemy was found inside aggro range.
    Spotted,
    /// An enemy is inside attack range.
    InRange,
    /// The engaged target drifted out of attack range but stays worth chasing.
    Drifted,
    /// The target left range or disappeared.
    TargetLost,
    /// Special power is full at a cycle boundary.
    Charge,
    /// The charged cycle finished.
    CastComplete,
    /// The target vanished while a channeling unit was mid-attack.
    Interrupted,
    /// A channeling unit's pending damage tick has been applied.
    DamageResolved,
    /// A crowd-control effect took hold.
    Stun,
    /// Crowd control ended; carries the state held before the stun.
    Recover(CombatState),
}

impl CombatState {
    /// Returns the state after `event`. Events that do not apply leave the
    /// state unchanged.
    #[must_use]
    pub fn next(self, event: CombatEvent) -> Self {
        use CombatEvent as E;
        match (self, event) {
            (Self::Stunned, E::Recover(Self::Stunned)) => Self::Idle,
            (Self::Stunned, E::Recover(previous)) => previous,
            (Self::Stunned, _) => Self::Stunned,
            (_, E::Stun) => Self::Stunned,

            (Self::Idle | Self::Approaching, E::InRange) => Self::Engaged,
            (Self::Idle | Self::Approaching, E::Spotted) => Self::Approaching,
            (Self::Approaching, E::TargetLost) => Self::Idle,

            (Self::Engaged, E::Charge) => Self::Charging,
            (Self::Charging, E::CastComplete) => Self::Engaged,
            (Self::Engaged | Self::Charging, E::Drifted) => Self::Approaching,
            (Self::Engaged | Self::Charging, E::TargetLost) => Self::Idle,
            (Self::Engaged | Self::Charging, E::Interrupted) => Self::Channeling,

            (Self::Channeling, E::DamageResolved | E::TargetLost) => Self::Idle,

            (state, _) => state,
        }
    }

    /// Whether the attack-frame counter advances in this state.
    #[must_use]
    pub fn advances_frames(self) -> bool {
        matches!(self, Self::Engaged | Self::Charging | Self::Channeling)
    }

    /// Whether the unit holds position and only turns to face its target.
    #[must_use]
    pub fn holds_position(self) -> bool {
        self.advances_frames() || self == Self::Stunned
    }

    /// Whether the unit should run the closest-enemy search this tick.
    #[must_use]
    pub fn is_searching(self) -> bool {
        matches!(self, Self::Idle | Self::Approaching)
    }
}

/// Advances an attack-frame counter by one tick.
///
/// A frame at or past `cycle` wraps to `-1` before the increment, so a
/// counter started at 0 with cycle `R` reads `0, 1, ..., R, 0, 1, ...`.
#[must_use]
pub fn advance_frame(frame: i32, cycle: i32) -> i32 {
    let frame = if frame >= cycle { -1 } else { frame };
    frame + 1
}

/// Whether `frame` falls inside the inclusive damage window.
#[must_use]
pub fn in_window(frame: i32, start: i32, end: i32) -> bool {
    (start..=end).contains(&frame)
}
