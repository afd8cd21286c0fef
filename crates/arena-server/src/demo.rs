//! Scripted players for the demo match.
//!
//! The director stands in for two clients: it deploys the first affordable
//! card in hand every few ticks and acknowledges removed UIDs the way a
//! client would after despawning them.

use arena_common::{MatchId, Team};
use arena_sim::prelude::*;

use crate::config::DemoConfig;

/// Issues commands on behalf of both players.
#[derive(Debug)]
pub struct Director {
    match_id: MatchId,
    config: DemoConfig,
    deployed: [u32; 2],
}

impl Director {
    /// Creates a director for one match.
    pub fn new(match_id: MatchId, config: DemoConfig) -> Self {
        Self {
            match_id,
            config,
            deployed: [0; 2],
        }
    }

    /// The command that opens the match.
    pub fn create_match(&self) -> Command {
        Command::CreateMatch {
            match_id: self.match_id,
            map: self.config.map.clone(),
            players: [
                PlayerSetup {
                    nickname: "blue".into(),
                    deck: self.config.blue_deck.clone(),
                },
                PlayerSetup {
                    nickname: "red".into(),
                    deck: self.config.red_deck.clone(),
                },
            ],
        }
    }

    /// Commands to queue before the next tick.
    pub fn plan(&mut self, sim: &Simulation) -> Vec<Command> {
        let Some(state) = sim.match_state(self.match_id) else {
            return Vec::new();
        };
        if state.is_over() {
            return Vec::new();
        }

        let mut commands = Vec::new();
        for team in Team::ALL {
            let player = state.player(team);
            if !player.pending_removals.is_empty() {
                commands.push(Command::RemoveUnits {
                    match_id: self.match_id,
                    team,
                    uids: player.pending_removals.iter().copied().collect(),
                });
            }

            if self.config.deploy_every == 0 || state.tick % self.config.deploy_every != 0 {
                continue;
            }
            let card = player.hand.iter().find(|card| {
                sim.registries()
                    .unit(card)
                    .is_ok_and(|stats| stats.is_deployable() && stats.cost <= player.gold)
            });
            if let Some(card) = card {
                let [x, y] = self.spawn_point(team);
                commands.push(Command::CreateUnit {
                    match_id: self.match_id,
                    team,
                    unit: card.clone(),
                    x,
                    y,
                });
                self.deployed[team.index()] += 1;
            }
        }
        commands
    }

    /// Cycles deployments across three rows around the team's spawn point.
    fn spawn_point(&self, team: Team) -> [f32; 2] {
        let [x, y] = match team {
            Team::Blue => self.config.blue_spawn,
            Team::Red => self.config.red_spawn,
        };
        let row = (self.deployed[team.index()] % 3) as f32 - 1.0;
        [x, y + row * self.config.lane_spread]
    }

    /// Units deployed so far by `team`.
    pub fn deployed(&self, team: Team) -> u32 {
        self.deployed[team.index()]
    }
}
