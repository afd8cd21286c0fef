//! Team and class tags carried by every simulated body.

use serde::{Deserialize, Serialize};

/// One of the two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    /// Starts on the low-x side of the map.
    Blue,
    /// Starts on the high-x side of the map.
    Red,
}

impl Team {
    /// Both teams in player-slot order.
    pub const ALL: [Self; 2] = [Self::Blue, Self::Red];

    /// Returns the opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Blue => Self::Red,
            Self::Red => Self::Blue,
        }
    }

    /// Player slot index for this team.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Blue => 0,
            Self::Red => 1,
        }
    }
}

/// Which collision layer a body moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Units on foot and structures.
    Ground,
    /// Flying units.
    Air,
}

/// Broad class of a simulated body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Close-range ground unit. Cannot hit flying units.
    Melee,
    /// Ground unit that attacks from distance.
    Range,
    /// Flying unit.
    Air,
    /// Immovable tower or base.
    Structure,
    /// In-flight projectile. Never a target.
    Projectile,
}

impl UnitClass {
    /// Whether a body of this class may pick `other` as an attack target.
    #[must_use]
    pub fn can_target(self, other: Self) -> bool {
        match (self, other) {
            (_, Self::Projectile) | (Self::Projectile, _) => false,
            (Self::Melee, Self::Air) => false,
            _ => true,
        }
    }

    /// Whether bodies of this class translate on their own.
    #[must_use]
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Melee | Self::Range | Self::Air)
    }

    /// Collision layer for this class.
    #[must_use]
    pub fn layer(self) -> Layer {
        match self {
            Self::Air | Self::Projectile => Layer::Air,
            Self::Melee | Self::Range | Self::Structure => Layer::Ground,
        }
    }
}
