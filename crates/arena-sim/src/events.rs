//! Outbound event bus.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use arena_common::{EntityId, MatchId, Team, Uid};

/// Things the simulation reports to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A unit or structure entered the match
    UnitSpawned {
        /// Match
        match_id: MatchId,
        /// Entity id
        entity: EntityId,
        /// Client-facing id
        uid: Uid,
        /// Registry name
        name: String,
        /// Owning team
        team: Team,
    },
    /// Health went down
    Damaged {
        /// Match
        match_id: MatchId,
        /// Entity hit
        entity: EntityId,
        /// Damage actually dealt
        amount: f32,
        /// Attacker, if still known
        source: Option<EntityId>,
    },
    /// Health went up
    Healed {
        /// Match
        match_id: MatchId,
        /// Entity healed
        entity: EntityId,
        /// Health actually restored
        amount: f32,
    },
    /// An entity left the match
    Destroyed {
        /// Match
        match_id: MatchId,
        /// Entity id
        entity: EntityId,
        /// Client-facing id
        uid: Uid,
    },
    /// A tower changed sides
    TowerConverted {
        /// Match
        match_id: MatchId,
        /// Tower entity
        entity: EntityId,
        /// New owner
        team: Team,
    },
    /// A converted tower finished healing
    TowerRestored {
        /// Match
        match_id: MatchId,
        /// Tower entity
        entity: EntityId,
    },
    /// A base fell
    MatchEnded {
        /// Match
        match_id: MatchId,
        /// Team whose base is still standing
        winner: Team,
    },
}

impl SimEvent {
    /// Short name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnitSpawned { .. } => "unit_spawned",
            Self::Damaged { .. } => "damaged",
            Self::Healed { .. } => "healed",
            Self::Destroyed { .. } => "destroyed",
            Self::TowerConverted { .. } => "tower_converted",
            Self::TowerRestored { .. } => "tower_restored",
            Self::MatchEnded { .. } => "match_ended",
        }
    }

    /// Match the event belongs to.
    #[must_use]
    pub const fn match_id(&self) -> MatchId {
        match self {
            Self::UnitSpawned { match_id, .. }
            | Self::Damaged { match_id, .. }
            | Self::Healed { match_id, .. }
            | Self::Destroyed { match_id, .. }
            | Self::TowerConverted { match_id, .. }
            | Self::TowerRestored { match_id, .. }
            | Self::MatchEnded { match_id, .. } => *match_id,
        }
    }
}

/// Bounded event bus. Publishing never blocks; a full bus drops the event.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<SimEvent>,
    /// Receiver for collecting events
    receiver: Receiver<SimEvent>,
    /// Channel capacity
    capacity: usize,
    /// Events lost to a full channel
    dropped: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: SimEvent) {
        if let Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) = self.sender.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(?event, "Event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<SimEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events dropped because the bus was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
