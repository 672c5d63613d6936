//! Per-room match context
//!
//! Owns every piece of simulation state for one room and exposes the entry
//! points used by human input and bots alike. The room task holds the only
//! instance, so nothing here is shared or locked.

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{GameEvent, RoomPlayerInfo};

use super::ammo::AmmoReloadManager;
use super::buy::{BuyCategory, BuyMenu};
use super::combat::FireController;
use super::economy::EconomySettlement;
use super::player::{Aim, GrenadeKind, MatchPlayer, PlayerCombatState, Team};
use super::refusal::Refusal;
use super::round::{MatchPhase, MatchRules, RoundPhaseController};
use super::scope::ScopeController;
use super::weapons::{WeaponCatalog, WeaponId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room is full")]
    RoomFull,

    #[error("player is already in the room")]
    AlreadyJoined,
}

pub struct MatchContext {
    pub room_id: String,
    pub round: RoundPhaseController,
    pub fire: FireController,
    pub players: HashMap<Uuid, MatchPlayer>,
    max_players: usize,
    roster_version: u64,
    /// Events produced by commands since the last tick
    events: Vec<GameEvent>,
}

impl MatchContext {
    pub fn new(room_id: impl Into<String>, rules: MatchRules, seed: u64, max_players: usize) -> Self {
        Self {
            room_id: room_id.into(),
            round: RoundPhaseController::new(rules, seed),
            // Separate stream so pellet spread does not shift bomb assignment
            fire: FireController::new(seed.wrapping_add(1)),
            players: HashMap::new(),
            max_players,
            roster_version: 0,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.round.phase()
    }

    pub fn roster_version(&self) -> u64 {
        self.roster_version
    }

    fn roster_changed(&mut self) {
        self.roster_version += 1;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn add_player(&mut self, id: Uuid, name: String) -> Result<(), JoinError> {
        if self.players.contains_key(&id) {
            return Err(JoinError::AlreadyJoined);
        }
        if self.players.len() >= self.max_players {
            return Err(JoinError::RoomFull);
        }

        info!(room_id = %self.room_id, player_id = %id, name = %name, "Player joined room");
        self.players.insert(id, MatchPlayer::new(id, name));
        self.roster_changed();
        Ok(())
    }

    /// Seat a bot. It plays through the same entry points as a human.
    pub fn add_bot(&mut self, name: String, difficulty: &str) -> Result<Uuid, JoinError> {
        let id = Uuid::new_v4();
        self.add_player(id, name)?;
        if let Some(bot) = self.players.get_mut(&id) {
            bot.is_bot = true;
            bot.bot_difficulty = Some(difficulty.to_string());
            bot.ready = true;
        }
        Ok(id)
    }

    pub fn remove_player(&mut self, id: &Uuid) -> bool {
        if self.players.remove(id).is_none() {
            return false;
        }

        self.round.bomb.cancel_all_for(id);
        self.round.ensure_carrier(&self.players);
        self.roster_changed();
        info!(room_id = %self.room_id, player_id = %id, "Player left room");
        true
    }

    fn player_mut(&mut self, id: &Uuid) -> Result<&mut MatchPlayer, Refusal> {
        self.players.get_mut(id).ok_or(Refusal::UnknownPlayer)
    }

    fn combat_mut(&mut self, id: &Uuid) -> Result<&mut PlayerCombatState, Refusal> {
        self.player_mut(id)?
            .combat
            .as_mut()
            .ok_or(Refusal::WrongTeamOrState)
    }

    fn require_combat_phase(&self) -> Result<(), Refusal> {
        if self.phase().combat_enabled() {
            Ok(())
        } else {
            Err(Refusal::CombatDisabled)
        }
    }

    /// Apply a sequenced ready toggle. Commands older than the last applied one are ignored.
    pub fn set_ready(&mut self, id: &Uuid, ready: bool, seq: u32) -> Result<(), Refusal> {
        let player = self.player_mut(id)?;
        if seq != 0 && seq <= player.last_seq {
            debug!(player_id = %id, seq, last_seq = player.last_seq, "Stale ready command");
            return Ok(());
        }
        player.ready = ready;
        player.last_seq = player.last_seq.max(seq);
        self.roster_changed();
        Ok(())
    }

    pub fn set_ping(&mut self, id: &Uuid, rtt_ms: u32) {
        if let Some(player) = self.players.get_mut(id) {
            if player.ping != rtt_ms {
                player.ping = rtt_ms;
                self.roster_changed();
            }
        }
    }

    /// Join (or switch to) a team. Players arriving mid-round sit out until the next freeze.
    pub fn select_team(&mut self, id: &Uuid, team: Team, now_ms: u64) -> Result<(), Refusal> {
        let phase = self.phase();
        let start_money = self.round.rules.start_money;
        let player = self.player_mut(id)?;
        if player.team() == Some(team) {
            return Ok(());
        }

        let money = player.combat.as_ref().map_or(start_money, |c| c.money);
        let mut combat = PlayerCombatState::new(*id, team, money);
        if matches!(phase, MatchPhase::Live | MatchPhase::RoundEnd) {
            combat.is_alive = false;
        }
        player.combat = Some(combat);

        info!(room_id = %self.room_id, player_id = %id, ?team, "Team selected");
        self.round.bomb.cancel_all_for(id);
        self.roster_changed();

        let events = self.round.on_team_selected(&mut self.players, now_ms);
        self.events.extend(events);
        self.round.ensure_carrier(&self.players);
        Ok(())
    }

    pub fn set_aim(&mut self, id: &Uuid, seq: u32, aim: Aim) -> Result<(), Refusal> {
        let player = self.player_mut(id)?;
        if seq != 0 && seq <= player.last_input_seq {
            return Ok(());
        }
        player.last_input_seq = player.last_input_seq.max(seq);
        if let Some(combat) = player.combat.as_mut() {
            combat.aim = aim;
        }
        Ok(())
    }

    pub fn press_trigger(&mut self, id: &Uuid, now_ms: u64) -> Result<(), Refusal> {
        self.require_combat_phase()?;
        let combat = self
            .players
            .get_mut(id)
            .ok_or(Refusal::UnknownPlayer)?
            .combat
            .as_mut()
            .ok_or(Refusal::WrongTeamOrState)?;

        let weapon = combat.weapon();
        match self.fire.press_trigger(combat, &weapon, now_ms) {
            Ok(projectiles) => {
                self.events.push(GameEvent::Shot { projectiles });
                Ok(())
            }
            Err(Refusal::NoAmmo) => {
                // Dry pull still refuses, but starts a reload when reserve allows
                if AmmoReloadManager::start_reload(combat, &weapon, now_ms).is_ok() {
                    ScopeController::unscope(combat);
                    combat.burst_shots_remaining = 0;
                    self.events.push(GameEvent::ReloadStarted { player_id: *id });
                }
                Err(Refusal::NoAmmo)
            }
            Err(refusal) => Err(refusal),
        }
    }

    pub fn release_trigger(&mut self, id: &Uuid) -> Result<(), Refusal> {
        FireController::release_trigger(self.combat_mut(id)?);
        Ok(())
    }

    pub fn reload(&mut self, id: &Uuid, now_ms: u64) -> Result<(), Refusal> {
        self.require_combat_phase()?;
        let combat = self.combat_mut(id)?;
        let weapon = combat.weapon();

        AmmoReloadManager::start_reload(combat, &weapon, now_ms)?;
        ScopeController::unscope(combat);
        combat.burst_shots_remaining = 0;
        self.events.push(GameEvent::ReloadStarted { player_id: *id });
        Ok(())
    }

    pub fn throw_grenade(&mut self, id: &Uuid, grenade: GrenadeKind) -> Result<(), Refusal> {
        self.require_combat_phase()?;
        let combat = self.combat_mut(id)?;
        if !combat.is_alive {
            return Err(Refusal::NotAlive);
        }
        if !combat.grenades.take(grenade) {
            return Err(Refusal::NotCarried);
        }
        let aim = combat.aim;
        self.events.push(GameEvent::GrenadeThrown {
            player_id: *id,
            grenade,
            aim,
        });
        Ok(())
    }

    pub fn toggle_scope(&mut self, id: &Uuid) -> Result<bool, Refusal> {
        self.require_combat_phase()?;
        let combat = self.combat_mut(id)?;
        let weapon = combat.weapon();
        ScopeController::toggle_scope(combat, &weapon)
    }

    pub fn switch_weapon(&mut self, id: &Uuid, weapon_key: &str) -> Result<(), Refusal> {
        let weapon_id: WeaponId = weapon_key.parse()?;
        self.combat_mut(id)?.switch_weapon(weapon_id)
    }

    pub fn purchase(
        &mut self,
        id: &Uuid,
        category: BuyCategory,
        item_id: &str,
    ) -> Result<u32, Refusal> {
        let phase = self.phase();
        BuyMenu::purchase(phase, self.combat_mut(id)?, category, item_id)
    }

    pub fn plant(&mut self, id: &Uuid, active: bool, now_ms: u64) -> Result<(), Refusal> {
        if !active {
            self.round.bomb.cancel_plant(id);
            return Ok(());
        }
        let phase = self.phase();
        let combat = self
            .players
            .get(id)
            .ok_or(Refusal::UnknownPlayer)?
            .combat
            .as_ref()
            .ok_or(Refusal::WrongTeamOrState)?;
        self.round.bomb.begin_plant(phase, combat, now_ms)
    }

    pub fn defuse(&mut self, id: &Uuid, active: bool, now_ms: u64) -> Result<(), Refusal> {
        if !active {
            self.round.bomb.cancel_defuse(id);
            return Ok(());
        }
        let phase = self.phase();
        let combat = self
            .players
            .get(id)
            .ok_or(Refusal::UnknownPlayer)?
            .combat
            .as_ref()
            .ok_or(Refusal::WrongTeamOrState)?;
        self.round.bomb.begin_defuse(phase, combat, now_ms)
    }

    /// Apply a hit resolved by the ballistics collaborator
    pub fn report_hit(
        &mut self,
        shooter_id: &Uuid,
        target_id: &Uuid,
        weapon_key: &str,
    ) -> Result<(), Refusal> {
        self.require_combat_phase()?;
        let weapon = WeaponCatalog::resolve(weapon_key);

        let shooter_team = self
            .players
            .get(shooter_id)
            .ok_or(Refusal::UnknownPlayer)?
            .team()
            .ok_or(Refusal::WrongTeamOrState)?;

        let target = self.players.get_mut(target_id).ok_or(Refusal::UnknownPlayer)?;
        let victim = target.combat.as_mut().ok_or(Refusal::WrongTeamOrState)?;
        if victim.team == shooter_team || !victim.is_alive {
            return Err(Refusal::WrongTeamOrState);
        }

        let killed = victim.apply_damage(weapon.damage_per_projectile);
        self.events.push(GameEvent::Hit {
            shooter_id: *shooter_id,
            target_id: *target_id,
            weapon_id: weapon.id,
            damage: weapon.damage_per_projectile,
        });
        if !killed {
            return Ok(());
        }

        target.deaths += 1;
        if let Some(shooter) = self.players.get_mut(shooter_id) {
            shooter.kills += 1;
            if let Some(combat) = shooter.combat.as_mut() {
                let reward = EconomySettlement::kill_reward(weapon.category);
                EconomySettlement::credit(combat, reward);
            }
        }
        info!(room_id = %self.room_id, killer = %shooter_id, victim = %target_id, weapon = %weapon.id, "Player killed");
        self.events.push(GameEvent::Kill {
            killer_id: Some(*shooter_id),
            victim_id: *target_id,
            weapon_id: weapon.id,
        });

        self.round.bomb.cancel_all_for(target_id);
        self.round.ensure_carrier(&self.players);
        self.roster_changed();
        Ok(())
    }

    /// External objective signal ending the live round
    pub fn declare_winner(&mut self, winner: Team, now_ms: u64) {
        let events = self.round.declare_winner(winner, now_ms);
        self.events.extend(events);
    }

    /// One simulation step. Returns every event since the previous tick.
    pub fn tick(&mut self, now_ms: u64) -> Vec<GameEvent> {
        let mut events = std::mem::take(&mut self.events);
        let combat_on = self.phase().combat_enabled();

        for (id, player) in self.players.iter_mut() {
            let Some(combat) = player.combat.as_mut() else {
                continue;
            };
            let weapon = combat.weapon();

            if AmmoReloadManager::tick(combat, &weapon, now_ms) {
                events.push(GameEvent::ReloadCompleted { player_id: *id });
            }
            if combat_on {
                let projectiles = self.fire.tick(combat, &weapon, now_ms);
                if !projectiles.is_empty() {
                    events.push(GameEvent::Shot { projectiles });
                }
            }
        }

        let before = self.round.state.current_round;
        events.extend(self.round.tick(&mut self.players, now_ms));
        if self.round.state.current_round != before {
            self.roster_changed();
        }
        events
    }

    /// Roster rows ordered by name for stable output
    pub fn roster(&self) -> Vec<RoomPlayerInfo> {
        let mut rows: Vec<RoomPlayerInfo> = self
            .players
            .values()
            .map(|p| RoomPlayerInfo {
                id: p.id,
                name: p.name.clone(),
                team: p.team(),
                ready: p.ready,
                is_bot: p.is_bot,
                bot_difficulty: p.bot_difficulty.clone(),
                kills: p.kills,
                deaths: p.deaths,
                ping: p.ping,
                last_seq: p.last_seq,
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rows
    }

    pub fn combat_states(&self) -> Vec<PlayerCombatState> {
        self.players
            .values()
            .filter_map(|p| p.combat.clone())
            .collect()
    }

    /// Team of a player, if they picked one
    pub fn team_of(&self, id: &Uuid) -> Option<Team> {
        self.players.get(id).and_then(MatchPlayer::team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{DEFUSE_BONUS, DEFUSE_TIME_MS, PLANT_TIME_MS};
    use crate::game::weapons::WeaponCategory;

    fn rules() -> MatchRules {
        MatchRules {
            freeze_time_ms: 1_000,
            round_time_ms: 60_000,
            round_end_delay_ms: 2_000,
            start_money: 800,
        }
    }

    /// One T and one CT, already in `live` at t = 1 000
    fn live_match() -> (MatchContext, Uuid, Uuid) {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let t = Uuid::new_v4();
        let ct = Uuid::new_v4();
        ctx.add_player(t, "terry".into()).unwrap();
        ctx.add_player(ct, "connie".into()).unwrap();
        ctx.select_team(&t, Team::T, 0).unwrap();
        ctx.select_team(&ct, Team::Ct, 0).unwrap();
        ctx.tick(1_000);
        assert_eq!(ctx.phase(), MatchPhase::Live);
        (ctx, t, ct)
    }

    fn combat(ctx: &MatchContext, id: &Uuid) -> PlayerCombatState {
        ctx.players[id].combat.clone().unwrap()
    }

    #[test]
    fn room_capacity_is_enforced() {
        let mut ctx = MatchContext::new("tiny", MatchRules::default(), 1, 1);
        ctx.add_player(Uuid::new_v4(), "a".into()).unwrap();
        assert_eq!(
            ctx.add_player(Uuid::new_v4(), "b".into()),
            Err(JoinError::RoomFull)
        );
        assert_eq!(ctx.add_bot("bot".into(), "easy"), Err(JoinError::RoomFull));
    }

    #[test]
    fn bots_use_the_same_entry_points() {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let bot = ctx.add_bot("Bot Alpha".into(), "hard").unwrap();
        ctx.select_team(&bot, Team::Ct, 0).unwrap();

        let row = ctx.roster().into_iter().find(|r| r.id == bot).unwrap();
        assert!(row.is_bot && row.ready);
        assert_eq!(row.bot_difficulty.as_deref(), Some("hard"));
        assert_eq!(row.team, Some(Team::Ct));
    }

    #[test]
    fn first_team_pick_starts_freeze_and_hands_out_the_bomb() {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let t = Uuid::new_v4();
        ctx.add_player(t, "terry".into()).unwrap();
        assert_eq!(ctx.phase(), MatchPhase::TeamSelect);

        ctx.select_team(&t, Team::T, 0).unwrap();
        assert_eq!(ctx.phase(), MatchPhase::Freeze);
        assert_eq!(ctx.round.bomb.state.carrier_player_id, Some(t));
        assert!(ctx
            .tick(0)
            .contains(&GameEvent::PhaseChanged { phase: MatchPhase::Freeze, round: 1 }));
    }

    #[test]
    fn combat_is_disabled_during_freeze() {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let t = Uuid::new_v4();
        ctx.add_player(t, "terry".into()).unwrap();
        ctx.select_team(&t, Team::T, 0).unwrap();

        assert_eq!(ctx.press_trigger(&t, 10), Err(Refusal::CombatDisabled));
        assert_eq!(ctx.reload(&t, 10), Err(Refusal::CombatDisabled));
        assert_eq!(ctx.purchase(&t, BuyCategory::Rifles, "ak47"), Err(Refusal::InsufficientFunds));
    }

    #[test]
    fn shots_and_reloads_surface_as_events() {
        let (mut ctx, t, _) = live_match();
        ctx.press_trigger(&t, 1_100).unwrap();
        ctx.release_trigger(&t).unwrap();
        let events = ctx.tick(1_133);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Shot { .. })));

        ctx.reload(&t, 2_000).unwrap();
        let events = ctx.tick(2_000 + WeaponCatalog::get(WeaponId::Glock).reload_time_ms);
        assert!(events.contains(&GameEvent::ReloadCompleted { player_id: t }));
        assert_eq!(combat(&ctx, &t).current_ammo, 20);
    }

    #[test]
    fn stale_ready_commands_are_ignored() {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let id = Uuid::new_v4();
        ctx.add_player(id, "a".into()).unwrap();

        ctx.set_ready(&id, true, 2).unwrap();
        ctx.set_ready(&id, false, 1).unwrap();
        assert!(ctx.players[&id].ready);
        assert_eq!(ctx.roster()[0].last_seq, 2);
        assert_eq!(ctx.set_ready(&Uuid::new_v4(), true, 3), Err(Refusal::UnknownPlayer));
    }

    #[test]
    fn kill_updates_roster_and_pays_reward() {
        let (mut ctx, t, ct) = live_match();
        let version = ctx.roster_version();

        ctx.report_hit(&t, &ct, "awp").unwrap();
        assert!(!combat(&ctx, &ct).is_alive);
        assert_eq!(ctx.players[&t].kills, 1);
        assert_eq!(ctx.players[&ct].deaths, 1);
        assert_eq!(
            combat(&ctx, &t).money,
            800 + EconomySettlement::kill_reward(WeaponCategory::Sniper)
        );
        assert!(ctx.roster_version() > version);

        assert_eq!(ctx.report_hit(&t, &ct, "awp"), Err(Refusal::WrongTeamOrState));
    }

    #[test]
    fn knife_kill_pays_the_melee_bonus() {
        let (mut ctx, t, ct) = live_match();
        ctx.players.get_mut(&t).unwrap().combat.as_mut().unwrap().money = 0;
        ctx.players.get_mut(&ct).unwrap().combat.as_mut().unwrap().health = 10.0;

        ctx.report_hit(&t, &ct, "knife").unwrap();
        assert!(!combat(&ctx, &ct).is_alive);
        assert_eq!(combat(&ctx, &t).money, 1_500);
    }

    #[test]
    fn dry_pull_refuses_and_starts_a_reload() {
        let (mut ctx, t, _) = live_match();
        {
            let state = ctx.players.get_mut(&t).unwrap().combat.as_mut().unwrap();
            state.current_ammo = 0;
            state.reserve_ammo = 40;
        }

        assert_eq!(ctx.press_trigger(&t, 1_100), Err(Refusal::NoAmmo));
        assert!(combat(&ctx, &t).is_reloading);
        let events = ctx.tick(1_100);
        assert!(events.contains(&GameEvent::ReloadStarted { player_id: t }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Shot { .. })));

        let events = ctx.tick(1_100 + WeaponCatalog::get(WeaponId::Glock).reload_time_ms);
        assert!(events.contains(&GameEvent::ReloadCompleted { player_id: t }));
        assert_eq!(combat(&ctx, &t).current_ammo, 20);
        assert_eq!(combat(&ctx, &t).reserve_ammo, 20);
    }

    #[test]
    fn dry_pull_without_reserve_only_refuses() {
        let (mut ctx, t, _) = live_match();
        {
            let state = ctx.players.get_mut(&t).unwrap().combat.as_mut().unwrap();
            state.current_ammo = 0;
            state.reserve_ammo = 0;
        }

        assert_eq!(ctx.press_trigger(&t, 1_100), Err(Refusal::NoAmmo));
        assert!(!combat(&ctx, &t).is_reloading);
        assert!(!ctx
            .tick(1_100)
            .iter()
            .any(|e| matches!(e, GameEvent::ReloadStarted { .. })));
    }

    #[test]
    fn aim_sequence_never_moves_backwards() {
        let (mut ctx, t, _) = live_match();
        let aim = |x: f32| Aim { x, y: 0.0, angle: 0.0 };

        ctx.set_aim(&t, 5, aim(5.0)).unwrap();
        ctx.set_aim(&t, 0, aim(0.5)).unwrap();
        assert_eq!(ctx.players[&t].last_input_seq, 5);
        assert_eq!(combat(&ctx, &t).aim.x, 0.5);

        ctx.set_aim(&t, 3, aim(3.0)).unwrap();
        assert_eq!(combat(&ctx, &t).aim.x, 0.5);

        ctx.set_aim(&t, 6, aim(6.0)).unwrap();
        assert_eq!(combat(&ctx, &t).aim.x, 6.0);
    }

    #[test]
    fn thrown_grenades_leave_the_pouch() {
        let mut ctx = MatchContext::new("dust2", rules(), 3, 10);
        let t = Uuid::new_v4();
        ctx.add_player(t, "terry".into()).unwrap();
        ctx.select_team(&t, Team::T, 0).unwrap();
        ctx.purchase(&t, BuyCategory::Equipment, "flashbang").unwrap();
        assert_eq!(ctx.throw_grenade(&t, GrenadeKind::Flashbang), Err(Refusal::CombatDisabled));

        ctx.tick(1_000);
        assert_eq!(ctx.phase(), MatchPhase::Live);
        ctx.throw_grenade(&t, GrenadeKind::Flashbang).unwrap();
        assert_eq!(combat(&ctx, &t).grenades.count(GrenadeKind::Flashbang), 0);
        assert_eq!(ctx.throw_grenade(&t, GrenadeKind::Flashbang), Err(Refusal::NotCarried));
        assert!(ctx.tick(1_033).contains(&GameEvent::GrenadeThrown {
            player_id: t,
            grenade: GrenadeKind::Flashbang,
            aim: Aim::default(),
        }));
    }

    #[test]
    fn friendly_fire_is_refused() {
        let (mut ctx, t, _) = live_match();
        let mate = Uuid::new_v4();
        ctx.add_player(mate, "tina".into()).unwrap();
        ctx.select_team(&mate, Team::T, 1_000).unwrap();
        assert_eq!(ctx.report_hit(&t, &mate, "ak47"), Err(Refusal::WrongTeamOrState));
    }

    #[test]
    fn mid_round_joiner_waits_for_next_freeze() {
        let (mut ctx, _, _) = live_match();
        let late = Uuid::new_v4();
        ctx.add_player(late, "late".into()).unwrap();
        ctx.select_team(&late, Team::Ct, 5_000).unwrap();
        assert!(!combat(&ctx, &late).is_alive);
        assert_eq!(ctx.press_trigger(&late, 5_000), Err(Refusal::NotAlive));
    }

    #[test]
    fn full_bomb_round_through_the_context() {
        let (mut ctx, t, ct) = live_match();

        ctx.plant(&t, true, 2_000).unwrap();
        ctx.tick(2_000 + PLANT_TIME_MS);
        assert!(ctx.round.bomb.state.is_planted);

        ctx.defuse(&ct, true, 6_000).unwrap();
        ctx.defuse(&ct, false, 7_000).unwrap();
        ctx.tick(6_000 + DEFUSE_TIME_MS);
        assert_eq!(ctx.phase(), MatchPhase::Live);

        ctx.defuse(&ct, true, 8_000).unwrap();
        ctx.tick(8_000 + DEFUSE_TIME_MS);
        assert_eq!(ctx.phase(), MatchPhase::RoundEnd);

        ctx.tick(8_000 + DEFUSE_TIME_MS + 2_000);
        assert_eq!(ctx.phase(), MatchPhase::Freeze);
        assert_eq!(ctx.round.state.ct_score, 1);
        assert_eq!(combat(&ctx, &ct).money, 800 + DEFUSE_BONUS + 3_250);
    }

    #[test]
    fn departing_carrier_hands_the_bomb_over() {
        let (mut ctx, t, _) = live_match();
        let other = Uuid::new_v4();
        ctx.add_player(other, "tom".into()).unwrap();
        ctx.select_team(&other, Team::T, 0).unwrap();
        ctx.tick(60_000 + 1_000);
        ctx.tick(60_000 + 3_000);
        assert_eq!(ctx.phase(), MatchPhase::Freeze);

        let carrier = ctx.round.bomb.state.carrier_player_id.unwrap();
        ctx.remove_player(&carrier);
        let expected = if carrier == t { other } else { t };
        assert_eq!(ctx.round.bomb.state.carrier_player_id, Some(expected));
    }
}
