//! Fire control - the per-weapon fire-mode state machine
//!
//! `FireController` never simulates bullets. It validates a trigger pull,
//! consumes ammo and hands back spawn descriptors for the ballistics
//! collaborator to fly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::{BURST_SHOTS, BURST_SHOT_INTERVAL_MS, DUAL_ANGLE_OFFSET, DUAL_PAIR_OFFSET_MS};
use super::player::PlayerCombatState;
use super::refusal::Refusal;
use super::scope::ScopeController;
use super::weapons::{FireMode, WeaponCategory, WeaponDefinition, WeaponId};

/// Projectile speed per weapon category (units per frame at 60 fps)
fn projectile_speed(category: WeaponCategory) -> f32 {
    match category {
        WeaponCategory::Pistol => 15.0,
        WeaponCategory::Shotgun => 12.0,
        WeaponCategory::Smg => 16.0,
        WeaponCategory::Rifle => 20.0,
        WeaponCategory::Sniper => 25.0,
        WeaponCategory::Machinegun => 18.0,
        WeaponCategory::Melee => 0.0,
    }
}

/// One projectile to be produced by the ballistics collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSpawn {
    pub shooter_id: Uuid,
    pub weapon_id: WeaponId,
    pub origin_x: f32,
    pub origin_y: f32,
    /// Radians
    pub direction: f32,
    pub speed: f32,
    pub damage: f32,
    /// Emission delay relative to the tick that produced it
    pub delay_ms: u64,
}

pub type FireResult = Result<Vec<ProjectileSpawn>, Refusal>;

pub struct FireController {
    rng: ChaCha8Rng,
}

impl FireController {
    /// Pellet spread is drawn from a seeded RNG so a room replays identically
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Validate and perform one trigger pull.
    ///
    /// Checks run in a fixed order and the first failure is returned with
    /// `state` untouched.
    pub fn attempt_fire(
        &mut self,
        state: &mut PlayerCombatState,
        weapon: &WeaponDefinition,
        now_ms: u64,
    ) -> FireResult {
        if !state.is_alive || state.health <= 0.0 {
            return Err(Refusal::NotAlive);
        }
        if state.is_reloading {
            return Err(Refusal::AlreadyReloading);
        }
        if state.burst_shots_remaining > 0 {
            return Err(Refusal::OnCooldown);
        }
        if let Some(last) = state.last_shot_at_ms {
            if now_ms.saturating_sub(last) < weapon.fire_rate_ms {
                return Err(Refusal::OnCooldown);
            }
        }
        if weapon.fire_mode != FireMode::Melee && state.current_ammo == 0 {
            return Err(Refusal::NoAmmo);
        }
        if weapon.fire_mode == FireMode::Bolt && weapon.requires_scope && !state.is_scoped {
            return Err(Refusal::NotScoped);
        }

        state.last_shot_at_ms = Some(now_ms);

        let shots = match weapon.fire_mode {
            FireMode::Semi | FireMode::Auto => {
                state.current_ammo -= 1;
                vec![self.spawn(state, weapon, 0.0, 0)]
            }
            FireMode::Burst => {
                state.current_ammo -= 1;
                state.burst_shots_remaining = BURST_SHOTS - 1;
                state.next_burst_shot_at_ms = now_ms + BURST_SHOT_INTERVAL_MS;
                vec![self.spawn(state, weapon, 0.0, 0)]
            }
            FireMode::Dual => {
                let pair = state.current_ammo.min(2);
                state.current_ammo -= pair;
                let mut shots = vec![self.spawn(state, weapon, -DUAL_ANGLE_OFFSET, 0)];
                if pair > 1 {
                    shots.push(self.spawn(state, weapon, DUAL_ANGLE_OFFSET, DUAL_PAIR_OFFSET_MS));
                }
                shots
            }
            FireMode::Pump | FireMode::AutoShotgun => {
                state.current_ammo -= 1;
                self.pellets(state, weapon)
            }
            FireMode::Bolt => {
                state.current_ammo -= 1;
                ScopeController::unscope(state);
                vec![self.spawn(state, weapon, 0.0, 0)]
            }
            FireMode::Melee => vec![self.spawn(state, weapon, 0.0, 0)],
        };

        Ok(shots)
    }

    /// Trigger pressed. Repeating modes keep firing from `tick` until release.
    pub fn press_trigger(
        &mut self,
        state: &mut PlayerCombatState,
        weapon: &WeaponDefinition,
        now_ms: u64,
    ) -> FireResult {
        state.trigger_held = weapon.fire_mode.repeats_while_held();
        self.attempt_fire(state, weapon, now_ms)
    }

    /// Trigger released. A burst already in flight still completes.
    pub fn release_trigger(state: &mut PlayerCombatState) {
        state.trigger_held = false;
    }

    /// Per-tick continuation: scheduled burst shots and held-trigger re-fire
    pub fn tick(
        &mut self,
        state: &mut PlayerCombatState,
        weapon: &WeaponDefinition,
        now_ms: u64,
    ) -> Vec<ProjectileSpawn> {
        let mut shots = Vec::new();

        while state.burst_shots_remaining > 0 && now_ms >= state.next_burst_shot_at_ms {
            if !state.is_alive || state.is_reloading || state.current_ammo == 0 {
                state.burst_shots_remaining = 0;
                break;
            }
            state.current_ammo -= 1;
            state.burst_shots_remaining -= 1;
            state.last_shot_at_ms = Some(state.next_burst_shot_at_ms);
            state.next_burst_shot_at_ms += BURST_SHOT_INTERVAL_MS;
            shots.push(self.spawn(state, weapon, 0.0, 0));
        }

        if state.trigger_held && weapon.fire_mode.repeats_while_held() {
            if let Ok(more) = self.attempt_fire(state, weapon, now_ms) {
                shots.extend(more);
            }
        }

        shots
    }

    fn pellets(&mut self, state: &PlayerCombatState, weapon: &WeaponDefinition) -> Vec<ProjectileSpawn> {
        (0..weapon.pellet_count)
            .map(|_| {
                let offset = (self.rng.gen::<f32>() - 0.5) * weapon.spread;
                let mut pellet = self.spawn(state, weapon, offset, 0);
                pellet.speed *= self.rng.gen_range(0.8f32..1.2);
                pellet
            })
            .collect()
    }

    fn spawn(
        &self,
        state: &PlayerCombatState,
        weapon: &WeaponDefinition,
        angle_offset: f32,
        delay_ms: u64,
    ) -> ProjectileSpawn {
        ProjectileSpawn {
            shooter_id: state.player_id,
            weapon_id: weapon.id,
            origin_x: state.aim.x,
            origin_y: state.aim.y,
            direction: state.aim.angle + angle_offset,
            speed: projectile_speed(weapon.category),
            damage: weapon.damage_per_projectile,
            delay_ms,
        }
    }
}
