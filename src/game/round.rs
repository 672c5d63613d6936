//! Round lifecycle: team-select -> freeze -> live -> round-end -> freeze ...

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ws::protocol::GameEvent;

use super::bomb::{BombController, BombEvent};
use super::constants::{
    DEFUSE_BONUS, FREEZE_TIME_MS, PLANT_BONUS, ROUND_END_DELAY_MS, ROUND_TIME_MS, START_MONEY,
};
use super::economy::EconomySettlement;
use super::player::{MatchPlayer, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPhase {
    TeamSelect,
    Freeze,
    Live,
    RoundEnd,
}

impl MatchPhase {
    /// The only edges of the phase graph
    pub fn can_transition_to(self, next: MatchPhase) -> bool {
        matches!(
            (self, next),
            (MatchPhase::TeamSelect, MatchPhase::Freeze)
                | (MatchPhase::Freeze, MatchPhase::Live)
                | (MatchPhase::Live, MatchPhase::RoundEnd)
                | (MatchPhase::RoundEnd, MatchPhase::Freeze)
        )
    }

    /// Firing, reloading and scoping are only allowed once the round is on
    pub fn combat_enabled(self) -> bool {
        matches!(self, MatchPhase::Live | MatchPhase::RoundEnd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    BombExploded,
    BombDefused,
    TimeExpired,
    Elimination,
    /// Opaque objective signal from outside the simulation
    Objective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub winner: Team,
    pub reason: WinReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub phase: MatchPhase,
    pub phase_entered_at_ms: u64,
    /// Remaining round time, frozen once the bomb is planted
    pub round_time_ms: u64,
    pub buy_time_remaining_ms: u64,
    pub ct_score: u32,
    pub t_score: u32,
    pub current_round: u32,
    pub last_outcome: Option<RoundOutcome>,
}

/// Round timings and starting money
#[derive(Debug, Clone, Copy)]
pub struct MatchRules {
    pub freeze_time_ms: u64,
    pub round_time_ms: u64,
    pub round_end_delay_ms: u64,
    pub start_money: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            freeze_time_ms: FREEZE_TIME_MS,
            round_time_ms: ROUND_TIME_MS,
            round_end_delay_ms: ROUND_END_DELAY_MS,
            start_money: START_MONEY,
        }
    }
}

pub struct RoundPhaseController {
    pub state: MatchState,
    pub rules: MatchRules,
    pub bomb: BombController,
    rng: ChaCha8Rng,
}

impl RoundPhaseController {
    pub fn new(rules: MatchRules, seed: u64) -> Self {
        Self {
            state: MatchState {
                phase: MatchPhase::TeamSelect,
                phase_entered_at_ms: 0,
                round_time_ms: rules.round_time_ms,
                buy_time_remaining_ms: rules.freeze_time_ms,
                ct_score: 0,
                t_score: 0,
                current_round: 1,
                last_outcome: None,
            },
            rules,
            bomb: BombController::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Move along one edge of the phase graph. Any other edge is rejected.
    fn transition(&mut self, next: MatchPhase, now_ms: u64, events: &mut Vec<GameEvent>) -> bool {
        let from = self.state.phase;
        if !from.can_transition_to(next) {
            warn!(?from, to = ?next, "Rejected phase transition");
            return false;
        }

        self.state.phase = next;
        self.state.phase_entered_at_ms = now_ms;
        info!(?from, to = ?next, round = self.state.current_round, "Phase changed");
        events.push(GameEvent::PhaseChanged {
            phase: next,
            round: self.state.current_round,
        });
        true
    }

    /// A player picked a team. The first pick starts the match.
    pub fn on_team_selected(
        &mut self,
        players: &mut HashMap<Uuid, MatchPlayer>,
        now_ms: u64,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.state.phase == MatchPhase::TeamSelect {
            self.enter_freeze(players, now_ms, &mut events);
        } else if self.bomb.state.carrier_player_id.is_none() && !self.bomb.state.is_planted {
            self.assign_bomb(players);
        }
        events
    }

    fn enter_freeze(
        &mut self,
        players: &mut HashMap<Uuid, MatchPlayer>,
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if !self.transition(MatchPhase::Freeze, now_ms, events) {
            return;
        }

        self.state.buy_time_remaining_ms = self.rules.freeze_time_ms;
        self.state.round_time_ms = self.rules.round_time_ms;
        self.bomb.reset();
        for combat in players.values_mut().filter_map(|p| p.combat.as_mut()) {
            combat.respawn();
        }
        self.assign_bomb(players);
    }

    /// Hand the bomb to a random living terrorist, or nobody
    pub fn assign_bomb(&mut self, players: &HashMap<Uuid, MatchPlayer>) {
        let mut candidates: Vec<Uuid> = players
            .values()
            .filter(|p| p.team() == Some(Team::T) && p.is_alive())
            .map(|p| p.id)
            .collect();
        candidates.sort_unstable();

        let carrier = candidates.choose(&mut self.rng).copied();
        self.bomb.assign_carrier(carrier);
        if let Some(id) = carrier {
            info!(player_id = %id, "Bomb assigned");
        }
    }

    /// Re-assign the bomb if its carrier can no longer plant it
    pub fn ensure_carrier(&mut self, players: &HashMap<Uuid, MatchPlayer>) {
        if self.bomb.state.is_planted {
            return;
        }
        let valid = self
            .bomb
            .state
            .carrier_player_id
            .and_then(|id| players.get(&id))
            .is_some_and(|p| p.team() == Some(Team::T) && p.is_alive());
        if !valid {
            self.assign_bomb(players);
        }
    }

    /// End the live round. Ignored outside `live`.
    pub fn end_round(&mut self, outcome: RoundOutcome, now_ms: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.state.phase != MatchPhase::Live {
            return events;
        }
        if self.transition(MatchPhase::RoundEnd, now_ms, &mut events) {
            self.state.last_outcome = Some(outcome);
            info!(winner = ?outcome.winner, reason = ?outcome.reason, "Round ended");
            events.push(GameEvent::RoundEnded {
                winner: outcome.winner,
                reason: outcome.reason,
            });
        }
        events
    }

    /// External objective signal
    pub fn declare_winner(&mut self, winner: Team, now_ms: u64) -> Vec<GameEvent> {
        self.end_round(
            RoundOutcome {
                winner,
                reason: WinReason::Objective,
            },
            now_ms,
        )
    }

    /// Pay out the round, bump score and round counter, and start the next freeze
    fn finish_round(
        &mut self,
        players: &mut HashMap<Uuid, MatchPlayer>,
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if let Some(outcome) = self.state.last_outcome {
            for combat in players.values_mut().filter_map(|p| p.combat.as_mut()) {
                EconomySettlement::settle(combat, combat.team == outcome.winner);
            }
            match outcome.winner {
                Team::Ct => self.state.ct_score += 1,
                Team::T => self.state.t_score += 1,
            }
        }
        self.state.current_round += 1;
        self.enter_freeze(players, now_ms, events);
    }

    /// Advance phase timers and the bomb
    pub fn tick(&mut self, players: &mut HashMap<Uuid, MatchPlayer>, now_ms: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let elapsed = now_ms.saturating_sub(self.state.phase_entered_at_ms);

        match self.state.phase {
            MatchPhase::TeamSelect => {}
            MatchPhase::Freeze => {
                self.state.buy_time_remaining_ms = self.rules.freeze_time_ms.saturating_sub(elapsed);
                if self.state.buy_time_remaining_ms == 0 {
                    self.transition(MatchPhase::Live, now_ms, &mut events);
                }
            }
            MatchPhase::Live => self.tick_live(players, now_ms, elapsed, &mut events),
            MatchPhase::RoundEnd => {
                if elapsed >= self.rules.round_end_delay_ms {
                    self.finish_round(players, now_ms, &mut events);
                }
            }
        }

        events
    }

    fn tick_live(
        &mut self,
        players: &mut HashMap<Uuid, MatchPlayer>,
        now_ms: u64,
        elapsed: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let outcome = match self.bomb.tick(now_ms) {
            Some(BombEvent::Planted { planter_id }) => {
                if let Some(combat) = players.get_mut(&planter_id).and_then(|p| p.combat.as_mut()) {
                    EconomySettlement::credit(combat, PLANT_BONUS);
                }
                events.push(GameEvent::BombPlanted { planter_id });
                None
            }
            Some(BombEvent::Defused { defuser_id }) => {
                if let Some(combat) = players.get_mut(&defuser_id).and_then(|p| p.combat.as_mut()) {
                    EconomySettlement::credit(combat, DEFUSE_BONUS);
                }
                events.push(GameEvent::BombDefused { defuser_id });
                Some(RoundOutcome {
                    winner: Team::Ct,
                    reason: WinReason::BombDefused,
                })
            }
            Some(BombEvent::Exploded) => {
                events.push(GameEvent::BombExploded);
                Some(RoundOutcome {
                    winner: Team::T,
                    reason: WinReason::BombExploded,
                })
            }
            None => None,
        };

        let outcome = outcome.or_else(|| {
            if !self.bomb.state.is_planted {
                self.state.round_time_ms = self.rules.round_time_ms.saturating_sub(elapsed);
                if self.state.round_time_ms == 0 {
                    return Some(RoundOutcome {
                        winner: Team::Ct,
                        reason: WinReason::TimeExpired,
                    });
                }
            }
            eliminated_winner(players, self.bomb.state.is_planted).map(|winner| RoundOutcome {
                winner,
                reason: WinReason::Elimination,
            })
        });

        if let Some(outcome) = outcome {
            events.extend(self.end_round(outcome, now_ms));
        }
    }
}

/// Winner by elimination. Only a team that has members can be wiped out.
fn eliminated_winner(players: &HashMap<Uuid, MatchPlayer>, bomb_planted: bool) -> Option<Team> {
    let wiped = |team: Team| {
        let mut members = players.values().filter(|p| p.team() == Some(team)).peekable();
        members.peek().is_some() && members.all(|p| !p.is_alive())
    };

    if wiped(Team::Ct) {
        Some(Team::T)
    } else if wiped(Team::T) && !bomb_planted {
        Some(Team::Ct)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bomb::BombState;
    use crate::game::constants::{DEFUSE_TIME_MS, PLANT_TIME_MS};
    use crate::game::player::PlayerCombatState;

    const RULES: MatchRules = MatchRules {
        freeze_time_ms: 15_000,
        round_time_ms: 115_000,
        round_end_delay_ms: 5_000,
        start_money: 800,
    };

    fn roster(teams: &[Team]) -> HashMap<Uuid, MatchPlayer> {
        teams
            .iter()
            .map(|&team| {
                let id = Uuid::new_v4();
                let mut player = MatchPlayer::new(id, format!("{team:?}"));
                player.combat = Some(PlayerCombatState::new(id, team, 800));
                (id, player)
            })
            .collect()
    }

    fn first_of(players: &HashMap<Uuid, MatchPlayer>, team: Team) -> Uuid {
        players
            .values()
            .find(|p| p.team() == Some(team))
            .map(|p| p.id)
            .unwrap()
    }

    fn combat(players: &HashMap<Uuid, MatchPlayer>, id: Uuid) -> &PlayerCombatState {
        players[&id].combat.as_ref().unwrap()
    }

    /// Controller already in `live` at t = 15 000
    fn live(players: &mut HashMap<Uuid, MatchPlayer>) -> RoundPhaseController {
        let mut round = RoundPhaseController::new(RULES, 42);
        round.on_team_selected(players, 0);
        round.tick(players, 15_000);
        assert_eq!(round.phase(), MatchPhase::Live);
        round
    }

    #[test]
    fn phases_follow_the_cycle() {
        let mut players = roster(&[Team::T, Team::Ct]);
        let mut round = RoundPhaseController::new(RULES, 42);

        assert!(round.tick(&mut players, 1_000_000).is_empty());
        assert_eq!(round.phase(), MatchPhase::TeamSelect);

        let events = round.on_team_selected(&mut players, 0);
        assert_eq!(
            events,
            vec![GameEvent::PhaseChanged {
                phase: MatchPhase::Freeze,
                round: 1
            }]
        );
        assert_eq!(round.bomb.state.carrier_player_id, Some(first_of(&players, Team::T)));

        round.tick(&mut players, 14_999);
        assert_eq!(round.phase(), MatchPhase::Freeze);
        assert_eq!(round.state.buy_time_remaining_ms, 1);
        round.tick(&mut players, 15_000);
        assert_eq!(round.phase(), MatchPhase::Live);

        round.declare_winner(Team::T, 20_000);
        assert_eq!(round.phase(), MatchPhase::RoundEnd);
        round.tick(&mut players, 25_000);
        assert_eq!(round.phase(), MatchPhase::Freeze);
        assert_eq!(round.state.t_score, 1);
        assert_eq!(round.state.current_round, 2);
    }

    #[test]
    fn no_edge_skips_a_phase() {
        use MatchPhase::*;
        let all = [TeamSelect, Freeze, Live, RoundEnd];
        let allowed = [(TeamSelect, Freeze), (Freeze, Live), (Live, RoundEnd), (RoundEnd, Freeze)];
        for from in all {
            for to in all {
                assert_eq!(from.can_transition_to(to), allowed.contains(&(from, to)));
            }
        }

        let mut round = RoundPhaseController::new(RULES, 1);
        assert!(round.declare_winner(Team::Ct, 0).is_empty());
        assert_eq!(round.phase(), TeamSelect);
    }

    #[test]
    fn plant_then_defuse_ends_round_for_ct_and_pays_out() {
        let mut players = roster(&[Team::T, Team::Ct]);
        let t = first_of(&players, Team::T);
        let ct = first_of(&players, Team::Ct);
        let mut round = live(&mut players);

        round
            .bomb
            .begin_plant(MatchPhase::Live, combat(&players, t), 20_000)
            .unwrap();
        let events = round.tick(&mut players, 20_000 + PLANT_TIME_MS);
        assert!(events.contains(&GameEvent::BombPlanted { planter_id: t }));
        assert!(round.bomb.state.is_planted);
        assert_eq!(round.bomb.state.bomb_timer_ms, 40_000);

        round
            .bomb
            .begin_defuse(MatchPhase::Live, combat(&players, ct), 24_000)
            .unwrap();
        round.tick(&mut players, 24_000 + DEFUSE_TIME_MS - 1);
        assert_eq!(round.phase(), MatchPhase::Live);
        let events = round.tick(&mut players, 24_000 + DEFUSE_TIME_MS);
        assert!(events.contains(&GameEvent::RoundEnded {
            winner: Team::Ct,
            reason: WinReason::BombDefused
        }));
        assert_eq!(round.phase(), MatchPhase::RoundEnd);
        assert_eq!(combat(&players, ct).money, 800 + DEFUSE_BONUS);

        round.tick(&mut players, 34_000 + RULES.round_end_delay_ms);
        assert_eq!(round.phase(), MatchPhase::Freeze);
        assert_eq!(round.state.ct_score, 1);
        assert_eq!(round.state.t_score, 0);
        assert_eq!(combat(&players, ct).money, 800 + DEFUSE_BONUS + 3_250);
        assert_eq!(combat(&players, t).money, 800 + PLANT_BONUS + 1_400);
    }

    #[test]
    fn new_round_resets_the_bomb() {
        let mut players = roster(&[Team::T, Team::Ct]);
        let t = first_of(&players, Team::T);
        let mut round = live(&mut players);

        round
            .bomb
            .begin_plant(MatchPhase::Live, combat(&players, t), 16_000)
            .unwrap();
        round.tick(&mut players, 16_000 + PLANT_TIME_MS);
        round.tick(&mut players, 16_000 + PLANT_TIME_MS + 40_000);
        assert_eq!(round.state.last_outcome.map(|o| o.winner), Some(Team::T));

        round.tick(&mut players, 100_000);
        assert_eq!(round.phase(), MatchPhase::Freeze);
        let expected = BombState {
            carrier_player_id: Some(t),
            ..BombState::default()
        };
        assert_eq!(round.bomb.state, expected);
    }

    #[test]
    fn round_timer_expiry_goes_to_ct_unless_planted() {
        let mut players = roster(&[Team::T, Team::Ct]);
        let mut round = live(&mut players);
        round.tick(&mut players, 15_000 + RULES.round_time_ms);
        assert_eq!(
            round.state.last_outcome,
            Some(RoundOutcome {
                winner: Team::Ct,
                reason: WinReason::TimeExpired
            })
        );

        let t = first_of(&players, Team::T);
        let mut round = live(&mut players);
        round
            .bomb
            .begin_plant(MatchPhase::Live, combat(&players, t), 120_000)
            .unwrap();
        round.tick(&mut players, 123_000);
        round.tick(&mut players, 15_000 + RULES.round_time_ms + 1);
        assert_eq!(round.phase(), MatchPhase::Live);
    }

    #[test]
    fn elimination_ends_the_round() {
        let mut players = roster(&[Team::T, Team::Ct, Team::Ct]);
        let t = first_of(&players, Team::T);
        let mut round = live(&mut players);

        players.get_mut(&t).unwrap().combat.as_mut().unwrap().apply_damage(500.0);
        round.tick(&mut players, 16_000);
        assert_eq!(
            round.state.last_outcome,
            Some(RoundOutcome {
                winner: Team::Ct,
                reason: WinReason::Elimination
            })
        );

        round.tick(&mut players, 30_000);
        assert!(combat(&players, t).is_alive);
    }

    #[test]
    fn single_team_lobby_is_not_eliminated() {
        let players = roster(&[Team::T]);
        assert_eq!(eliminated_winner(&players, false), None);
    }
}
