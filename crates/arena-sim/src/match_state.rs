//! Per-match records: players, spatial index, UID counter, outcome.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use arena_common::{CommandError, MatchId, Team, Uid};

use crate::config::SimConfig;
use crate::spatial_hash::SpatialHash;

/// One side of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Display name
    pub nickname: String,
    /// Side played
    pub team: Team,
    /// Spendable gold
    pub gold: f32,
    /// Cards that can be played now
    pub hand: Vec<String>,
    /// Cards waiting to be drawn
    pub deck: VecDeque<String>,
    /// UIDs destroyed since the client last acknowledged
    pub pending_removals: BTreeSet<Uid>,
}

impl Player {
    /// Creates a player and deals the opening hand.
    #[must_use]
    pub fn new(nickname: impl Into<String>, team: Team, deck: Vec<String>, config: &SimConfig) -> Self {
        let mut deck: VecDeque<String> = deck.into();
        let hand = (0..config.hand_size).map_while(|_| deck.pop_front()).collect();
        Self {
            nickname: nickname.into(),
            team,
            gold: config.gold_start,
            hand,
            deck,
            pending_removals: BTreeSet::new(),
        }
    }

    /// Checks that `card` can be played for `cost` without changing anything.
    pub fn can_play(&self, card: &str, cost: f32) -> Result<(), CommandError> {
        if !self.hand.iter().any(|c| c == card) {
            return Err(CommandError::CardNotInHand(card.to_string()));
        }
        if self.gold < cost {
            return Err(CommandError::InsufficientGold {
                needed: cost,
                available: self.gold,
            });
        }
        Ok(())
    }

    /// Spends gold, sends `card` to the back of the deck and draws the next one.
    pub fn play(&mut self, card: &str, cost: f32) -> Result<(), CommandError> {
        self.can_play(card, cost)?;
        let Some(slot) = self.hand.iter().position(|c| c == card) else {
            return Err(CommandError::CardNotInHand(card.to_string()));
        };
        self.gold -= cost;
        let played = self.hand.remove(slot);
        self.deck.push_back(played);
        if let Some(next) = self.deck.pop_front() {
            self.hand.insert(slot, next);
        }
        Ok(())
    }

    /// Adds a tick's worth of gold, capped.
    pub fn regenerate(&mut self, amount: f32, cap: f32) {
        self.gold = (self.gold + amount).min(cap);
    }

    /// Clears acknowledged UIDs. Returns how many were pending.
    pub fn acknowledge(&mut self, uids: &[Uid]) -> usize {
        uids.iter().filter(|uid| self.pending_removals.remove(*uid)).count()
    }
}

/// Everything a match owns apart from its entities.
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Match id
    pub id: MatchId,
    /// Map name
    pub map: String,
    /// Blue then red
    pub players: [Player; 2],
    /// Broad-phase index of the match's units and structures
    pub hash: SpatialHash,
    /// Next UID to hand out
    pub next_uid: Uid,
    /// Ticks simulated
    pub tick: u64,
    /// Set when a base falls
    pub winner: Option<Team>,
}

impl MatchState {
    /// Creates a match with empty index.
    #[must_use]
    pub fn new(id: MatchId, map: impl Into<String>, players: [Player; 2], hash: SpatialHash) -> Self {
        Self {
            id,
            map: map.into(),
            players,
            hash,
            next_uid: Uid::FIRST,
            tick: 0,
            winner: None,
        }
    }

    /// Player on `team`.
    #[must_use]
    pub fn player(&self, team: Team) -> &Player {
        &self.players[team.index()]
    }

    /// Mutable player on `team`.
    pub fn player_mut(&mut self, team: Team) -> &mut Player {
        &mut self.players[team.index()]
    }

    /// Hands out the next UID.
    pub fn allocate_uid(&mut self) -> Uid {
        let uid = self.next_uid;
        self.next_uid = uid.next();
        uid
    }

    /// Queues `uid` for removal on both clients.
    pub fn mark_removed(&mut self, uid: Uid) {
        for player in &mut self.players {
            player.pending_removals.insert(uid);
        }
    }

    /// Whether a base has fallen.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn deck() -> Vec<String> {
        ["knight", "archer", "giant", "cleric", "dragon", "flamer"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_opening_hand() {
        let player = Player::new("ana", Team::Blue, deck(), &SimConfig::default());
        assert_eq!(player.hand, vec!["knight", "archer", "giant", "cleric"]);
        assert_eq!(player.deck.len(), 2);
        assert_eq!(player.gold, 5.0);
    }

    #[test]
    fn test_play_cycles_card() {
        let mut player = Player::new("ana", Team::Blue, deck(), &SimConfig::default());
        assert!(player.play("archer", 3.0).is_ok());
        assert_eq!(player.hand, vec!["knight", "dragon", "giant", "cleric"]);
        assert_eq!(player.deck.back().map(String::as_str), Some("archer"));
        assert_eq!(player.gold, 2.0);
    }

    #[test]
    fn test_play_rejects_without_mutation() {
        let mut player = Player::new("ana", Team::Blue, deck(), &SimConfig::default());
        let before = player.clone();
        assert!(matches!(
            player.play("giant", 9.0),
            Err(CommandError::InsufficientGold { .. })
        ));
        assert!(matches!(player.play("flamer", 1.0), Err(CommandError::CardNotInHand(_))));
        assert_eq!(player, before);
    }

    #[test]
    fn test_uids_and_removals() {
        let config = SimConfig::default();
        let players = [
            Player::new("a", Team::Blue, deck(), &config),
            Player::new("b", Team::Red, deck(), &config),
        ];
        let hash = SpatialHash::new(Vec2::ZERO, 100.0).expect("valid cell size");
        let mut state = MatchState::new(MatchId::new(1), "arena", players, hash);

        let first = state.allocate_uid();
        let second = state.allocate_uid();
        assert_eq!(second, first.next());

        state.mark_removed(first);
        assert_eq!(state.player_mut(Team::Red).acknowledge(&[first, second]), 1);
        assert!(state.player(Team::Red).pending_removals.is_empty());
        assert!(state.player(Team::Blue).pending_removals.contains(&first));
    }

    #[test]
    fn test_gold_regen_caps() {
        let mut player = Player::new("ana", Team::Red, deck(), &SimConfig::default());
        for _ in 0..1000 {
            player.regenerate(0.05, 10.0);
        }
        assert_eq!(player.gold, 10.0);
    }
}
