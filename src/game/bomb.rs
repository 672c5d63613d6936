//! Bomb plant/defuse sub-state machine

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::constants::{BOMB_TIMER_DEFAULT_MS, DEFUSE_KIT_TIME_MS, DEFUSE_TIME_MS, PLANT_TIME_MS};
use super::player::{PlayerCombatState, Team};
use super::refusal::Refusal;
use super::round::MatchPhase;

/// Round objective state, reset every round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombState {
    pub carrier_player_id: Option<Uuid>,
    pub is_planted: bool,
    /// 0..=1
    pub plant_progress: f32,
    /// 0..=1
    pub defuse_progress: f32,
    /// Remaining fuse
    pub bomb_timer_ms: u64,
    pub planted_at_ms: Option<u64>,
    pub planter_id: Option<Uuid>,
}

impl Default for BombState {
    fn default() -> Self {
        Self {
            carrier_player_id: None,
            is_planted: false,
            plant_progress: 0.0,
            defuse_progress: 0.0,
            bomb_timer_ms: BOMB_TIMER_DEFAULT_MS,
            planted_at_ms: None,
            planter_id: None,
        }
    }
}

/// What a single player is doing with the bomb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BombAction {
    #[default]
    Idle,
    Planting {
        started_at_ms: u64,
    },
    Defusing {
        started_at_ms: u64,
        duration_ms: u64,
    },
}

/// Objective outcome of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombEvent {
    Planted { planter_id: Uuid },
    Defused { defuser_id: Uuid },
    Exploded,
}

#[derive(Debug, Default)]
pub struct BombController {
    pub state: BombState,
    actions: HashMap<Uuid, BombAction>,
}

fn progress(elapsed_ms: u64, duration_ms: u64) -> f32 {
    if duration_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f32 / duration_ms as f32).min(1.0)
}

impl BombController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the initial state, dropping every in-progress action
    pub fn reset(&mut self) {
        self.state = BombState::default();
        self.actions.clear();
    }

    pub fn assign_carrier(&mut self, carrier: Option<Uuid>) {
        if !self.state.is_planted {
            self.state.carrier_player_id = carrier;
        }
    }

    pub fn action_of(&self, player_id: &Uuid) -> BombAction {
        self.actions.get(player_id).copied().unwrap_or_default()
    }

    pub fn begin_plant(
        &mut self,
        phase: MatchPhase,
        player: &PlayerCombatState,
        now_ms: u64,
    ) -> Result<(), Refusal> {
        let eligible = phase == MatchPhase::Live
            && player.team == Team::T
            && player.is_alive
            && self.state.carrier_player_id == Some(player.player_id)
            && !self.state.is_planted
            && self.action_of(&player.player_id) == BombAction::Idle;
        if !eligible {
            return Err(Refusal::WrongTeamOrState);
        }

        self.actions.insert(
            player.player_id,
            BombAction::Planting {
                started_at_ms: now_ms,
            },
        );
        self.state.plant_progress = 0.0;
        debug!(player_id = %player.player_id, "Plant started");
        Ok(())
    }

    /// Abort a plant. No partial credit is kept.
    pub fn cancel_plant(&mut self, player_id: &Uuid) {
        if matches!(self.action_of(player_id), BombAction::Planting { .. }) {
            self.actions.remove(player_id);
            self.state.plant_progress = 0.0;
            debug!(player_id = %player_id, "Plant cancelled");
        }
    }

    pub fn begin_defuse(
        &mut self,
        phase: MatchPhase,
        player: &PlayerCombatState,
        now_ms: u64,
    ) -> Result<(), Refusal> {
        let eligible = phase == MatchPhase::Live
            && player.team == Team::Ct
            && player.is_alive
            && self.state.is_planted
            && self.action_of(&player.player_id) == BombAction::Idle;
        if !eligible {
            return Err(Refusal::WrongTeamOrState);
        }

        let duration_ms = if player.has_defuse_kit {
            DEFUSE_KIT_TIME_MS
        } else {
            DEFUSE_TIME_MS
        };
        self.actions.insert(
            player.player_id,
            BombAction::Defusing {
                started_at_ms: now_ms,
                duration_ms,
            },
        );
        debug!(player_id = %player.player_id, duration_ms, "Defuse started");
        Ok(())
    }

    pub fn cancel_defuse(&mut self, player_id: &Uuid) {
        if matches!(self.action_of(player_id), BombAction::Defusing { .. }) {
            self.actions.remove(player_id);
            if !self
                .actions
                .values()
                .any(|a| matches!(a, BombAction::Defusing { .. }))
            {
                self.state.defuse_progress = 0.0;
            }
            debug!(player_id = %player_id, "Defuse cancelled");
        }
    }

    /// Drop whatever the player was doing (death, disconnect)
    pub fn cancel_all_for(&mut self, player_id: &Uuid) {
        self.cancel_plant(player_id);
        self.cancel_defuse(player_id);
    }

    /// Advance plant, defuse and fuse timers.
    ///
    /// A defuse completing on the same tick as the explosion wins.
    pub fn tick(&mut self, now_ms: u64) -> Option<BombEvent> {
        if !self.state.is_planted {
            return self.tick_plant(now_ms);
        }

        let mut best: Option<(Uuid, f32)> = None;
        for (id, action) in &self.actions {
            if let BombAction::Defusing {
                started_at_ms,
                duration_ms,
            } = *action
            {
                let p = progress(now_ms.saturating_sub(started_at_ms), duration_ms);
                if best.map_or(true, |(_, b)| p > b) {
                    best = Some((*id, p));
                }
            }
        }

        if let Some((defuser_id, p)) = best {
            self.state.defuse_progress = p;
            if p >= 1.0 {
                self.actions.clear();
                info!(player_id = %defuser_id, "Bomb defused");
                return Some(BombEvent::Defused { defuser_id });
            }
        }

        let planted_at = self.state.planted_at_ms.unwrap_or(now_ms);
        self.state.bomb_timer_ms =
            BOMB_TIMER_DEFAULT_MS.saturating_sub(now_ms.saturating_sub(planted_at));
        if self.state.bomb_timer_ms == 0 {
            self.actions.clear();
            info!("Bomb exploded");
            return Some(BombEvent::Exploded);
        }

        None
    }

    fn tick_plant(&mut self, now_ms: u64) -> Option<BombEvent> {
        let (planter_id, started_at_ms) = self.actions.iter().find_map(|(id, action)| match action {
            BombAction::Planting { started_at_ms } => Some((*id, *started_at_ms)),
            _ => None,
        })?;

        self.state.plant_progress = progress(now_ms.saturating_sub(started_at_ms), PLANT_TIME_MS);
        if self.state.plant_progress < 1.0 {
            return None;
        }

        self.actions.remove(&planter_id);
        self.state.is_planted = true;
        self.state.carrier_player_id = None;
        self.state.planter_id = Some(planter_id);
        self.state.planted_at_ms = Some(now_ms);
        self.state.bomb_timer_ms = BOMB_TIMER_DEFAULT_MS;
        info!(player_id = %planter_id, "Bomb planted");
        Some(BombEvent::Planted { planter_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrorist() -> PlayerCombatState {
        PlayerCombatState::new(Uuid::new_v4(), Team::T, 800)
    }

    fn counter_terrorist() -> PlayerCombatState {
        PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800)
    }

    fn planted_by(t: &PlayerCombatState) -> BombController {
        let mut bomb = BombController::new();
        bomb.assign_carrier(Some(t.player_id));
        bomb.begin_plant(MatchPhase::Live, t, 0).unwrap();
        assert!(bomb.tick(PLANT_TIME_MS).is_some());
        bomb
    }

    #[test]
    fn holding_plant_for_full_duration_plants() {
        let t = terrorist();
        let mut bomb = BombController::new();
        bomb.assign_carrier(Some(t.player_id));

        bomb.begin_plant(MatchPhase::Live, &t, 1_000).unwrap();
        assert_eq!(bomb.tick(2_500), None);
        assert!((bomb.state.plant_progress - 0.5).abs() < 1e-6);

        assert_eq!(
            bomb.tick(1_000 + PLANT_TIME_MS),
            Some(BombEvent::Planted {
                planter_id: t.player_id
            })
        );
        assert!(bomb.state.is_planted);
        assert_eq!(bomb.state.bomb_timer_ms, 40_000);
        assert_eq!(bomb.state.carrier_player_id, None);
        assert_eq!(bomb.action_of(&t.player_id), BombAction::Idle);
    }

    #[test]
    fn releasing_plant_early_keeps_no_progress() {
        let t = terrorist();
        let mut bomb = BombController::new();
        bomb.assign_carrier(Some(t.player_id));

        bomb.begin_plant(MatchPhase::Live, &t, 0).unwrap();
        bomb.tick(1_500);
        bomb.cancel_plant(&t.player_id);
        assert_eq!(bomb.state.plant_progress, 0.0);
        assert!(!bomb.state.is_planted);

        bomb.cancel_plant(&t.player_id);
        assert_eq!(bomb.tick(10_000), None);
        assert!(!bomb.state.is_planted);
        assert_eq!(bomb.state.carrier_player_id, Some(t.player_id));
    }

    #[test]
    fn plant_eligibility() {
        let t = terrorist();
        let ct = counter_terrorist();
        let mut bomb = BombController::new();

        assert_eq!(bomb.begin_plant(MatchPhase::Live, &t, 0), Err(Refusal::WrongTeamOrState));
        bomb.assign_carrier(Some(t.player_id));
        assert_eq!(bomb.begin_plant(MatchPhase::Freeze, &t, 0), Err(Refusal::WrongTeamOrState));
        assert_eq!(bomb.begin_plant(MatchPhase::Live, &ct, 0), Err(Refusal::WrongTeamOrState));

        bomb.begin_plant(MatchPhase::Live, &t, 0).unwrap();
        assert_eq!(bomb.begin_plant(MatchPhase::Live, &t, 5), Err(Refusal::WrongTeamOrState));
    }

    #[test]
    fn defuse_duration_depends_on_kit() {
        let t = terrorist();
        let mut ct = counter_terrorist();
        let mut bomb = planted_by(&t);

        assert_eq!(bomb.begin_defuse(MatchPhase::Live, &t, 0), Err(Refusal::WrongTeamOrState));

        bomb.begin_defuse(MatchPhase::Live, &ct, 5_000).unwrap();
        assert_eq!(bomb.tick(5_000 + DEFUSE_KIT_TIME_MS), None);
        assert_eq!(
            bomb.tick(5_000 + DEFUSE_TIME_MS),
            Some(BombEvent::Defused {
                defuser_id: ct.player_id
            })
        );

        let mut bomb = planted_by(&t);
        ct.has_defuse_kit = true;
        bomb.begin_defuse(MatchPhase::Live, &ct, 5_000).unwrap();
        assert!(matches!(
            bomb.tick(5_000 + DEFUSE_KIT_TIME_MS),
            Some(BombEvent::Defused { .. })
        ));
    }

    #[test]
    fn cancelled_defuse_restarts_from_zero() {
        let t = terrorist();
        let ct = counter_terrorist();
        let mut bomb = planted_by(&t);

        bomb.begin_defuse(MatchPhase::Live, &ct, 4_000).unwrap();
        bomb.tick(8_000);
        assert!(bomb.state.defuse_progress > 0.0);
        bomb.cancel_defuse(&ct.player_id);
        assert_eq!(bomb.state.defuse_progress, 0.0);

        bomb.begin_defuse(MatchPhase::Live, &ct, 9_000).unwrap();
        assert_eq!(bomb.tick(9_000 + DEFUSE_TIME_MS - 1), None);
    }

    #[test]
    fn fuse_runs_out() {
        let t = terrorist();
        let mut bomb = planted_by(&t);
        assert_eq!(bomb.tick(PLANT_TIME_MS + 10_000), None);
        assert_eq!(bomb.state.bomb_timer_ms, 30_000);
        assert_eq!(bomb.tick(PLANT_TIME_MS + BOMB_TIMER_DEFAULT_MS), Some(BombEvent::Exploded));
    }

    #[test]
    fn defuse_beats_explosion_on_the_same_tick() {
        let t = terrorist();
        let ct = counter_terrorist();
        let mut bomb = planted_by(&t);
        let boom = PLANT_TIME_MS + BOMB_TIMER_DEFAULT_MS;

        bomb.begin_defuse(MatchPhase::Live, &ct, boom - DEFUSE_TIME_MS).unwrap();
        assert!(matches!(bomb.tick(boom), Some(BombEvent::Defused { .. })));
    }

    #[test]
    fn reset_restores_initial_state() {
        let t = terrorist();
        let ct = counter_terrorist();
        let mut bomb = planted_by(&t);
        bomb.begin_defuse(MatchPhase::Live, &ct, 4_000).unwrap();

        bomb.reset();
        assert_eq!(bomb.state, BombState::default());
        assert_eq!(bomb.action_of(&ct.player_id), BombAction::Idle);
    }
}
