//! Buy menu - weapon and equipment purchases during freeze time

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constants::MAX_ARMOR;
use super::player::{GrenadeKind, PlayerCombatState, Team};
use super::refusal::Refusal;
use super::round::MatchPhase;
use super::weapons::{WeaponCatalog, WeaponCategory, WeaponDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyCategory {
    Pistols,
    Shotguns,
    Smgs,
    Rifles,
    Snipers,
    Machineguns,
    Equipment,
}

impl BuyCategory {
    fn weapon_category(self) -> Option<WeaponCategory> {
        match self {
            BuyCategory::Pistols => Some(WeaponCategory::Pistol),
            BuyCategory::Shotguns => Some(WeaponCategory::Shotgun),
            BuyCategory::Smgs => Some(WeaponCategory::Smg),
            BuyCategory::Rifles => Some(WeaponCategory::Rifle),
            BuyCategory::Snipers => Some(WeaponCategory::Sniper),
            BuyCategory::Machineguns => Some(WeaponCategory::Machinegun),
            BuyCategory::Equipment => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Kevlar,
    KevlarHelmet,
    DefuseKit,
    #[serde(rename = "hegrenade")]
    HeGrenade,
    Flashbang,
    #[serde(rename = "smokegrenade")]
    SmokeGrenade,
}

impl Equipment {
    pub fn price(self) -> u32 {
        match self {
            Equipment::Kevlar => 650,
            Equipment::KevlarHelmet => 1_000,
            Equipment::DefuseKit => 200,
            Equipment::HeGrenade => 300,
            Equipment::Flashbang => 200,
            Equipment::SmokeGrenade => 300,
        }
    }

    fn grenade(self) -> Option<GrenadeKind> {
        match self {
            Equipment::HeGrenade => Some(GrenadeKind::He),
            Equipment::Flashbang => Some(GrenadeKind::Flashbang),
            Equipment::SmokeGrenade => Some(GrenadeKind::Smoke),
            _ => None,
        }
    }

    fn applicable_to(self, state: &PlayerCombatState) -> bool {
        match self {
            Equipment::Kevlar => state.armor < MAX_ARMOR,
            Equipment::KevlarHelmet => state.armor < MAX_ARMOR || !state.has_helmet,
            Equipment::DefuseKit => state.team == Team::Ct && !state.has_defuse_kit,
            _ => self.grenade().is_some_and(|kind| !state.grenades.is_full(kind)),
        }
    }

    fn apply(self, state: &mut PlayerCombatState) {
        match self {
            Equipment::Kevlar => state.armor = MAX_ARMOR,
            Equipment::KevlarHelmet => {
                state.armor = MAX_ARMOR;
                state.has_helmet = true;
            }
            Equipment::DefuseKit => state.has_defuse_kit = true,
            _ => {
                if let Some(kind) = self.grenade() {
                    state.grenades.add(kind);
                }
            }
        }
    }
}

impl FromStr for Equipment {
    type Err = Refusal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kevlar" => Ok(Equipment::Kevlar),
            "kevlar_helmet" => Ok(Equipment::KevlarHelmet),
            "defuse_kit" => Ok(Equipment::DefuseKit),
            "hegrenade" => Ok(Equipment::HeGrenade),
            "flashbang" => Ok(Equipment::Flashbang),
            "smokegrenade" => Ok(Equipment::SmokeGrenade),
            _ => Err(Refusal::UnknownWeapon),
        }
    }
}

enum Item {
    Weapon(WeaponDefinition),
    Equipment(Equipment),
}

impl Item {
    fn price(&self) -> u32 {
        match self {
            Item::Weapon(def) => def.price,
            Item::Equipment(eq) => eq.price(),
        }
    }
}

pub struct BuyMenu;

impl BuyMenu {
    /// Buy an item. Returns the money left on success.
    pub fn purchase(
        phase: MatchPhase,
        state: &mut PlayerCombatState,
        category: BuyCategory,
        item_id: &str,
    ) -> Result<u32, Refusal> {
        if phase != MatchPhase::Freeze {
            return Err(Refusal::NotBuyPhase);
        }
        if !state.is_alive {
            return Err(Refusal::WrongTeamOrState);
        }

        let item = match category.weapon_category() {
            Some(expected) => {
                let def = WeaponCatalog::lookup(item_id)?;
                if def.category != expected {
                    return Err(Refusal::UnknownWeapon);
                }
                Item::Weapon(def)
            }
            None => Item::Equipment(item_id.parse()?),
        };

        let allowed = match &item {
            Item::Weapon(def) => def.is_buyable_by(state.team),
            Item::Equipment(eq) => eq.applicable_to(state),
        };
        if !allowed {
            return Err(Refusal::WrongTeamOrState);
        }

        let price = item.price();
        if state.money < price {
            return Err(Refusal::InsufficientFunds);
        }

        state.money -= price;
        match item {
            Item::Weapon(def) => state.give_weapon(def),
            Item::Equipment(eq) => eq.apply(state),
        }
        debug!(player_id = %state.player_id, item = item_id, price, money = state.money, "Item purchased");
        Ok(state.money)
    }
}
