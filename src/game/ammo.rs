//! Magazine / reserve ammo and the reload timer

use super::player::PlayerCombatState;
use super::refusal::Refusal;
use super::weapons::WeaponDefinition;

pub struct AmmoReloadManager;

impl AmmoReloadManager {
    /// Begin a reload. The magazine stays untouched until the reload completes.
    pub fn start_reload(
        state: &mut PlayerCombatState,
        weapon: &WeaponDefinition,
        now_ms: u64,
    ) -> Result<(), Refusal> {
        if !state.is_alive {
            return Err(Refusal::NotAlive);
        }
        if state.is_reloading {
            return Err(Refusal::AlreadyReloading);
        }
        if state.current_ammo >= weapon.magazine_size {
            return Err(Refusal::MagazineFull);
        }
        if state.reserve_ammo == 0 {
            return Err(Refusal::NoReserveAmmo);
        }

        state.is_reloading = true;
        state.reload_started_at_ms = now_ms;
        Ok(())
    }

    /// Complete the reload once its duration has elapsed. Returns true on completion.
    pub fn tick(state: &mut PlayerCombatState, weapon: &WeaponDefinition, now_ms: u64) -> bool {
        if !state.is_reloading
            || now_ms.saturating_sub(state.reload_started_at_ms) < weapon.reload_time_ms
        {
            return false;
        }

        let deficit = weapon.magazine_size.saturating_sub(state.current_ammo);
        let transferred = deficit.min(state.reserve_ammo);
        state.current_ammo += transferred;
        state.reserve_ammo -= transferred;
        state.is_reloading = false;
        true
    }

    /// Abandon a reload in progress, leaving ammo as it was
    pub fn cancel(state: &mut PlayerCombatState) {
        state.is_reloading = false;
    }
}
