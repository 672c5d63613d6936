//! Round-end money settlement

use super::constants::{
    KILL_REWARD, KILL_REWARD_MELEE, KILL_REWARD_SHOTGUN, KILL_REWARD_SMG, KILL_REWARD_SNIPER,
    LOSS_REWARD, MAX_MONEY, WIN_REWARD,
};
use super::player::PlayerCombatState;
use super::weapons::WeaponCategory;

pub struct EconomySettlement;

impl EconomySettlement {
    pub fn reward(is_winner: bool) -> u32 {
        if is_winner {
            WIN_REWARD
        } else {
            LOSS_REWARD
        }
    }

    /// Payout for a kill, by the category of the weapon that landed it
    pub fn kill_reward(category: WeaponCategory) -> u32 {
        match category {
            WeaponCategory::Melee => KILL_REWARD_MELEE,
            WeaponCategory::Smg => KILL_REWARD_SMG,
            WeaponCategory::Shotgun => KILL_REWARD_SHOTGUN,
            WeaponCategory::Sniper => KILL_REWARD_SNIPER,
            WeaponCategory::Pistol | WeaponCategory::Rifle | WeaponCategory::Machinegun => {
                KILL_REWARD
            }
        }
    }

    /// Add money up to the cap. Returns what was actually credited.
    pub fn credit(state: &mut PlayerCombatState, amount: u32) -> u32 {
        let before = state.money;
        state.money = state.money.saturating_add(amount).min(MAX_MONEY);
        state.money - before
    }

    /// Pay out one player's round result
    pub fn settle(state: &mut PlayerCombatState, is_winner: bool) -> u32 {
        Self::credit(state, Self::reward(is_winner))
    }
}
