//! Component records stored against entities.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use arena_common::{EntityId, MatchId, Team, Uid, UnitClass};

use crate::combat::CombatState;

pub use crate::attack::Behavior;

/// Position and facing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Height above ground
    pub z: f32,
    /// Facing in radians
    pub rotation: f32,
}

impl Position {
    /// Ground position with zero height and facing.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            rotation: 0.0,
        }
    }

    /// Ground coordinates.
    #[must_use]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Full coordinates.
    #[must_use]
    pub fn xyz(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Moves on the ground plane, keeping height and facing.
    pub fn set_xy(&mut self, p: Vec2) {
        self.x = p.x;
        self.y = p.y;
    }
}

/// Identity of a simulated body within its match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Registry name
    pub name: String,
    /// Owning match
    pub match_id: MatchId,
    /// Per-match id reported to clients
    pub uid: Uid,
    /// Owning team
    pub team: Team,
    /// Class tag
    pub class: UnitClass,
    /// Collision radius
    pub radius: f32,
}

/// Movement profile of a mobile unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Distance per tick
    pub speed: f32,
    /// Distance to the enemy base; also the movement priority key
    pub distance_to_base: f32,
}

/// Hit points, always within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points
    pub current: f32,
    /// Maximum hit points
    pub max: f32,
}

impl Health {
    /// Full health.
    #[must_use]
    pub fn new(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    /// Subtracts `amount`, clamped at zero. Returns the damage actually dealt.
    pub fn damage(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        before - self.current
    }

    /// Adds `amount`, clamped at `max`. Returns the health actually restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.current = (self.current + amount.max(0.0)).clamp(0.0, self.max);
        self.current - before
    }

    /// Sets current health, clamped into range.
    pub fn set(&mut self, value: f32) {
        self.current = value.clamp(0.0, self.max);
    }

    /// Whether hit points have run out.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    /// Whether hit points are at maximum.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

/// Snapshot of a locked target, refreshed whenever it is re-read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLock {
    /// Target entity
    pub id: EntityId,
    /// Last known ground position
    pub position: Vec2,
    /// Target radius
    pub radius: f32,
    /// Target class
    pub class: UnitClass,
}

/// Normal attack profile and combat state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    /// Combat lifecycle state
    pub state: CombatState,
    /// State to return to when crowd control ends
    pub resume: CombatState,
    /// Current target
    pub target: Option<TargetLock>,
    /// Attack-frame counter
    pub frame: i32,
    /// Damage per hit
    pub damage: f32,
    /// Frames per attack cycle
    pub rate: i32,
    /// Frame on which the hit lands
    pub damage_frame: i32,
    /// Maximum edge distance for hits
    pub attack_radius: f32,
    /// Maximum edge distance for noticing enemies
    pub aggro_radius: f32,
}

impl Attack {
    /// Idle profile.
    #[must_use]
    pub fn new(damage: f32, rate: i32, damage_frame: i32, attack_radius: f32, aggro_radius: f32) -> Self {
        Self {
            state: CombatState::Idle,
            resume: CombatState::Idle,
            target: None,
            frame: 0,
            damage,
            rate,
            damage_frame,
            attack_radius,
            aggro_radius,
        }
    }

    /// Drops the target and returns to searching.
    pub fn reset(&mut self) {
        self.state = CombatState::Idle;
        self.target = None;
        self.frame = 0;
    }

    /// Id of the locked target.
    #[must_use]
    pub fn target_id(&self) -> Option<EntityId> {
        self.target.map(|t| t.id)
    }
}

/// Special-power charge and cast window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecialCharge {
    /// Frames per charged cycle
    pub rate: i32,
    /// Current charge
    pub current: u32,
    /// Charge needed to cast
    pub max: u32,
    /// Charge gained per normal hit
    pub gain: u32,
    /// Whether the current cycle is a charged one
    pub charged: bool,
    /// First frame of the damage window
    pub damage_frame: i32,
    /// Last frame of the damage window
    pub damage_end_frame: i32,
    /// Maximum edge distance while charged
    pub attack_radius: f32,
    /// Whether the power may hit a structure
    pub structure_targetable: bool,
    /// Target chosen when the charge started
    pub target: Option<TargetLock>,
}

impl SpecialCharge {
    /// Whether charge is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Adds one hit's worth of charge, capped at `max`.
    pub fn accrue(&mut self) {
        self.current = self.current.saturating_add(self.gain).min(self.max);
    }

    /// Ends a charged cycle.
    pub fn spend(&mut self) {
        self.current = 0;
        self.charged = false;
        self.target = None;
    }
}

/// Crowd-control counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrowdControl {
    /// Active stun sources; any positive value holds the unit
    pub stun: u32,
    /// Set by a knock-back; the next movement tick is skipped
    pub knocked_back: bool,
    /// Held in the air by a knock-up arc
    pub airborne: bool,
}

impl CrowdControl {
    /// Whether the unit is held in place.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.stun > 0 || self.airborne
    }
}

/// Tower or base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Ends the match when destroyed
    Base,
    /// Converts to the other team when destroyed
    Tower,
}

/// Combat availability of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StructureState {
    /// Fighting normally
    #[default]
    Default,
    /// Recovering after capture; does not fight
    Converting,
}

/// Structure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// Tower or base
    pub kind: StructureKind,
    /// Combat availability
    pub state: StructureState,
}

/// Flight mode of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Guidance {
    /// Follows a live target.
    Homing {
        /// Entity followed
        target: EntityId,
    },
    /// Flies straight until its range is spent.
    Straight {
        /// Unit ground direction
        direction: Vec2,
        /// Distance left to travel
        remaining: f32,
    },
}

/// In-flight projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity that fired it
    pub owner: EntityId,
    /// Distance per tick
    pub speed: f32,
    /// Damage on impact
    pub damage: f32,
    /// Height above a target's origin to aim at
    pub center_offset: f32,
    /// Flight mode
    pub guidance: Guidance,
    /// Entity to damage once `hit` is set
    pub strike: Option<EntityId>,
    /// Reached its target this tick
    pub hit: bool,
    /// Ready for removal
    pub destroyed: bool,
}

/// Vertical arc applied to a knocked-up unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnockUpArc {
    /// Unit in the air
    pub target: EntityId,
    /// Target height before launch
    pub base_z: f32,
    /// Height gained so far
    pub height: f32,
    /// Apex height
    pub target_height: f32,
    /// Vertical speed per tick
    pub speed: f32,
    /// Damage applied on landing
    pub damage: f32,
    /// Whether the arc is falling
    pub apex_reached: bool,
}

impl KnockUpArc {
    /// New arc at ground level.
    #[must_use]
    pub fn new(target: EntityId, target_height: f32, speed: f32, damage: f32) -> Self {
        Self {
            target,
            base_z: 0.0,
            height: 0.0,
            target_height,
            speed,
            damage,
            apex_reached: false,
        }
    }

    /// Advances one tick. Returns `true` on the tick the arc lands.
    pub fn step(&mut self) -> bool {
        if self.apex_reached {
            self.height -= self.speed.min(self.height);
            self.height <= 0.0
        } else {
            self.height += self.speed.min(self.target_height - self.height);
            if self.height >= self.target_height {
                self.apex_reached = true;
            }
            false
        }
    }

    /// Height to write to the target this tick.
    #[must_use]
    pub fn z(&self) -> f32 {
        self.base_z + self.height
    }
}

/// Payload of a timed-effect entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Holds targets for `duration` ticks.
    Stun {
        /// Units held
        targets: Vec<EntityId>,
        /// Ticks held
        duration: u32,
    },
    /// Heals allies in a circle every tick.
    HealOverTime {
        /// Circle center
        center: Vec2,
        /// Circle radius
        radius: f32,
        /// Health per tick
        amount: f32,
        /// Ticks active
        duration: u32,
    },
    /// Damages one target every tick.
    Burn {
        /// Unit burned
        target: EntityId,
        /// Damage per tick
        amount: f32,
        /// Ticks active
        duration: u32,
    },
    /// Lifts one target and drops it.
    KnockUp(KnockUpArc),
}

/// Timed-effect entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Owning match
    pub match_id: MatchId,
    /// Caster
    pub source: EntityId,
    /// Caster's team
    pub team: Team,
    /// Ticks run so far
    pub elapsed: u32,
    /// Ready for removal
    pub expired: bool,
    /// Payload
    pub kind: EffectKind,
}
