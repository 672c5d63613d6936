//! Scope state and movement speed resolution

use super::constants::SCOPED_SPEED_MULTIPLIER;
use super::player::PlayerCombatState;
use super::refusal::Refusal;
use super::weapons::{WeaponCategory, WeaponDefinition};

pub struct ScopeController;

impl ScopeController {
    /// Flip the scope on a scoped weapon. Returns the new scoped flag.
    pub fn toggle_scope(
        state: &mut PlayerCombatState,
        weapon: &WeaponDefinition,
    ) -> Result<bool, Refusal> {
        if !weapon.requires_scope {
            return Err(Refusal::NoScope);
        }
        if !state.is_alive {
            return Err(Refusal::NotAlive);
        }
        if state.is_reloading {
            return Err(Refusal::AlreadyReloading);
        }

        state.is_scoped = !state.is_scoped;
        state.scope_speed_multiplier = if state.is_scoped {
            SCOPED_SPEED_MULTIPLIER
        } else {
            1.0
        };
        Ok(state.is_scoped)
    }

    /// Drop the scope. No-op when not scoped.
    pub fn unscope(state: &mut PlayerCombatState) {
        state.is_scoped = false;
        state.scope_speed_multiplier = 1.0;
    }
}

pub struct MovementSpeedResolver;

impl MovementSpeedResolver {
    pub fn category_multiplier(category: WeaponCategory) -> f32 {
        match category {
            WeaponCategory::Sniper => 0.7,
            WeaponCategory::Machinegun => 0.8,
            WeaponCategory::Rifle => 0.9,
            _ => 1.0,
        }
    }

    pub fn resolve_speed(base_speed: f32, weapon: &WeaponDefinition, scope_multiplier: f32) -> f32 {
        base_speed * Self::category_multiplier(weapon.category) * scope_multiplier
    }

    /// Effective speed of a player with whatever they currently hold
    pub fn for_player(base_speed: f32, state: &PlayerCombatState) -> f32 {
        Self::resolve_speed(base_speed, &state.weapon(), state.scope_speed_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::Team;
    use crate::game::weapons::{WeaponCatalog, WeaponId};
    use uuid::Uuid;

    #[test]
    fn scope_toggles_only_on_scoped_weapons() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        let usp = WeaponCatalog::get(WeaponId::Usp);
        assert_eq!(ScopeController::toggle_scope(&mut state, &usp), Err(Refusal::NoScope));
        assert!(!state.is_scoped);

        let awp = WeaponCatalog::get(WeaponId::Awp);
        state.give_weapon(awp);
        assert_eq!(ScopeController::toggle_scope(&mut state, &awp), Ok(true));
        assert_eq!(state.scope_speed_multiplier, 0.5);
        assert_eq!(ScopeController::toggle_scope(&mut state, &awp), Ok(false));
        assert_eq!(state.scope_speed_multiplier, 1.0);
    }

    #[test]
    fn unscope_is_idempotent() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        ScopeController::unscope(&mut state);
        ScopeController::unscope(&mut state);
        assert!(!state.is_scoped);
        assert_eq!(state.scope_speed_multiplier, 1.0);
    }

    #[test]
    fn speed_combines_category_and_scope() {
        let awp = WeaponCatalog::get(WeaponId::Awp);
        let ak = WeaponCatalog::get(WeaponId::Ak47);
        let m249 = WeaponCatalog::get(WeaponId::M249);
        let knife = WeaponCatalog::get(WeaponId::Knife);

        assert!((MovementSpeedResolver::resolve_speed(250.0, &awp, 0.5) - 87.5).abs() < 1e-4);
        assert!((MovementSpeedResolver::resolve_speed(250.0, &ak, 1.0) - 225.0).abs() < 1e-4);
        assert!((MovementSpeedResolver::resolve_speed(250.0, &m249, 1.0) - 200.0).abs() < 1e-4);
        assert_eq!(MovementSpeedResolver::resolve_speed(250.0, &knife, 1.0), 250.0);
    }
}
