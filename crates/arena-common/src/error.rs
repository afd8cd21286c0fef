//! Error types for the arena simulation.
//!
//! Errors fall into three groups. Store errors are per-entity and the tick
//! skips that entity. Configuration errors fail the message or spawn that
//! triggered them without mutating state. Command errors reject an inbound
//! command.

use thiserror::Error;

use crate::ids::{EntityId, MatchId};

/// Top-level error type for arena operations.
#[derive(Debug, Clone, Error)]
pub enum ArenaError {
    /// Component store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration or registry errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Inbound command rejected
    #[error("command rejected: {0}")]
    Command(#[from] CommandError),
}

impl ArenaError {
    /// Whether this error came from invalid configuration.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this error is an entity missing a component it should have.
    #[must_use]
    pub fn is_missing_component(&self) -> bool {
        matches!(self, Self::Store(StoreError::MissingComponent { .. }))
    }
}

/// Component store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Entity does not exist
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity exists but lacks the requested component
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        /// Entity queried
        entity: EntityId,
        /// Component type name
        component: &'static str,
    },

    /// A write was refused because the entity is gone
    #[error("write of {component} to {entity} rejected")]
    WriteRejected {
        /// Entity written
        entity: EntityId,
        /// Component type name
        component: &'static str,
    },
}

/// Configuration and static data errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Unit name not present in the unit registry
    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    /// Map name not present in the map registry
    #[error("unknown map: {0}")]
    UnknownMap(String),

    /// Projectile name not present in the projectile registry
    #[error("unknown projectile: {0}")]
    UnknownProjectile(String),

    /// Spatial hash cell size must be positive and finite
    #[error("invalid spatial cell size: {0}")]
    InvalidCellSize(f32),

    /// Stat block failed validation
    #[error("invalid stats for {name}: {reason}")]
    InvalidStats {
        /// Registry entry name
        name: String,
        /// What was wrong
        reason: String,
    },

    /// Registry or config file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

/// Reasons an inbound command is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// No match with this id
    #[error("unknown match: {0}")]
    UnknownMatch(MatchId),

    /// A match with this id already exists
    #[error("match already exists: {0}")]
    MatchExists(MatchId),

    /// Match already has a winner
    #[error("match is over: {0}")]
    MatchOver(MatchId),

    /// Player cannot afford the unit
    #[error("insufficient gold: need {needed}, have {available}")]
    InsufficientGold {
        /// Cost of the unit
        needed: f32,
        /// Gold currently held
        available: f32,
    },

    /// Unit card is not in the player's hand
    #[error("card not in hand: {0}")]
    CardNotInHand(String),

    /// Spawn position outside the map
    #[error("position ({x}, {y}) is outside the map")]
    OutOfBounds {
        /// Requested x
        x: f32,
        /// Requested y
        y: f32,
    },

    /// Structures are placed by the map, not by players
    #[error("unit {0} cannot be deployed by a player")]
    NotDeployable(String),

    /// The inbound queue is full
    #[error("command queue full")]
    QueueFull,
}

/// Result type alias for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
