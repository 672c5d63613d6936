//! Weapon catalog - immutable weapon definitions keyed by weapon id

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::player::Team;
use super::refusal::Refusal;

/// Every weapon in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponId {
    Knife,
    Glock,
    Usp,
    Deagle,
    P228,
    Elite,
    Fiveseven,
    M3,
    Xm1014,
    Mac10,
    Tmp,
    Mp5,
    Ump45,
    P90,
    Galil,
    Famas,
    Ak47,
    M4a1,
    Sg552,
    Aug,
    Scout,
    Awp,
    G3sg1,
    Sg550,
    M249,
}

impl WeaponId {
    pub const ALL: [WeaponId; 25] = [
        WeaponId::Knife,
        WeaponId::Glock,
        WeaponId::Usp,
        WeaponId::Deagle,
        WeaponId::P228,
        WeaponId::Elite,
        WeaponId::Fiveseven,
        WeaponId::M3,
        WeaponId::Xm1014,
        WeaponId::Mac10,
        WeaponId::Tmp,
        WeaponId::Mp5,
        WeaponId::Ump45,
        WeaponId::P90,
        WeaponId::Galil,
        WeaponId::Famas,
        WeaponId::Ak47,
        WeaponId::M4a1,
        WeaponId::Sg552,
        WeaponId::Aug,
        WeaponId::Scout,
        WeaponId::Awp,
        WeaponId::G3sg1,
        WeaponId::Sg550,
        WeaponId::M249,
    ];

    /// Wire key, identical to the serde representation
    pub fn key(self) -> &'static str {
        match self {
            WeaponId::Knife => "knife",
            WeaponId::Glock => "glock",
            WeaponId::Usp => "usp",
            WeaponId::Deagle => "deagle",
            WeaponId::P228 => "p228",
            WeaponId::Elite => "elite",
            WeaponId::Fiveseven => "fiveseven",
            WeaponId::M3 => "m3",
            WeaponId::Xm1014 => "xm1014",
            WeaponId::Mac10 => "mac10",
            WeaponId::Tmp => "tmp",
            WeaponId::Mp5 => "mp5",
            WeaponId::Ump45 => "ump45",
            WeaponId::P90 => "p90",
            WeaponId::Galil => "galil",
            WeaponId::Famas => "famas",
            WeaponId::Ak47 => "ak47",
            WeaponId::M4a1 => "m4a1",
            WeaponId::Sg552 => "sg552",
            WeaponId::Aug => "aug",
            WeaponId::Scout => "scout",
            WeaponId::Awp => "awp",
            WeaponId::G3sg1 => "g3sg1",
            WeaponId::Sg550 => "sg550",
            WeaponId::M249 => "m249",
        }
    }
}

impl FromStr for WeaponId {
    type Err = Refusal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        WeaponId::ALL
            .into_iter()
            .find(|id| id.key() == key)
            .ok_or(Refusal::UnknownWeapon)
    }
}

impl fmt::Display for WeaponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponCategory {
    Pistol,
    Shotgun,
    Smg,
    Rifle,
    Sniper,
    Machinegun,
    Melee,
}

/// Inventory slot a weapon occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSlot {
    Primary,
    Secondary,
    Melee,
}

impl WeaponCategory {
    pub fn slot(self) -> WeaponSlot {
        match self {
            WeaponCategory::Pistol => WeaponSlot::Secondary,
            WeaponCategory::Melee => WeaponSlot::Melee,
            _ => WeaponSlot::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    Semi,
    Burst,
    Dual,
    Pump,
    Auto,
    AutoShotgun,
    Bolt,
    Melee,
}

impl FireMode {
    /// Whether a held trigger keeps firing without a new pull
    pub fn repeats_while_held(self) -> bool {
        matches!(self, FireMode::Auto | FireMode::AutoShotgun)
    }
}

/// Immutable weapon definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponDefinition {
    pub id: WeaponId,
    pub name: &'static str,
    pub category: WeaponCategory,
    pub fire_mode: FireMode,
    #[serde(rename = "magazine")]
    pub magazine_size: u32,
    pub reserve_cap: u32,
    #[serde(rename = "damage")]
    pub damage_per_projectile: f32,
    pub pellet_count: u32,
    /// Pellet cone width in radians (shotguns only)
    pub spread: f32,
    #[serde(rename = "fireRate")]
    pub fire_rate_ms: u64,
    #[serde(rename = "reloadTime")]
    pub reload_time_ms: u64,
    pub price: u32,
    pub requires_scope: bool,
    /// Team allowed to buy it, `None` for both
    pub buy_team: Option<Team>,
}

impl WeaponDefinition {
    #[allow(clippy::too_many_arguments)]
    fn gun(
        id: WeaponId,
        name: &'static str,
        category: WeaponCategory,
        fire_mode: FireMode,
        magazine_size: u32,
        reserve_cap: u32,
        damage: f32,
        fire_rate_ms: u64,
        reload_time_ms: u64,
        price: u32,
    ) -> Self {
        Self {
            id,
            name,
            category,
            fire_mode,
            magazine_size,
            reserve_cap,
            damage_per_projectile: damage,
            pellet_count: 1,
            spread: 0.0,
            fire_rate_ms,
            reload_time_ms,
            price,
            requires_scope: false,
            buy_team: None,
        }
    }

    fn pellets(mut self, count: u32, spread: f32) -> Self {
        self.pellet_count = count;
        self.spread = spread;
        self
    }

    fn scoped(mut self) -> Self {
        self.requires_scope = true;
        self
    }

    fn team(mut self, team: Team) -> Self {
        self.buy_team = Some(team);
        self
    }

    pub fn for_id(id: WeaponId) -> Self {
        use FireMode::*;
        use WeaponCategory::*;

        match id {
            WeaponId::Knife => Self::gun(id, "Knife", WeaponCategory::Melee, FireMode::Melee, 999, 0, 65.0, 1000, 0, 0),

            // Pistols
            WeaponId::Glock => {
                Self::gun(id, "Glock-18", Pistol, Burst, 20, 120, 25.0, 400, 2200, 200).team(Team::T)
            }
            WeaponId::Usp => {
                Self::gun(id, "USP-S", Pistol, Semi, 12, 100, 34.0, 350, 2500, 200).team(Team::Ct)
            }
            WeaponId::Deagle => Self::gun(id, "Desert Eagle", Pistol, Semi, 7, 35, 54.0, 267, 2200, 650),
            WeaponId::P228 => Self::gun(id, "P228", Pistol, Semi, 13, 52, 32.0, 300, 2700, 600),
            WeaponId::Elite => {
                Self::gun(id, "Dual Berettas", Pistol, Dual, 30, 120, 38.0, 500, 4200, 800)
                    .team(Team::T)
            }
            WeaponId::Fiveseven => {
                Self::gun(id, "Five-SeveN", Pistol, Semi, 20, 100, 25.0, 300, 2700, 750)
                    .team(Team::Ct)
            }

            // Shotguns
            WeaponId::M3 => {
                Self::gun(id, "M3 Super 90", Shotgun, Pump, 8, 32, 20.0, 880, 500, 1700)
                    .pellets(8, 0.15)
            }
            WeaponId::Xm1014 => {
                Self::gun(id, "XM1014", Shotgun, AutoShotgun, 7, 32, 22.0, 240, 400, 3000)
                    .pellets(6, 0.18)
            }

            // SMGs
            WeaponId::Mac10 => {
                Self::gun(id, "MAC-10", Smg, Auto, 30, 100, 27.0, 60, 3100, 1400).team(Team::T)
            }
            WeaponId::Tmp => {
                Self::gun(id, "TMP", Smg, Auto, 30, 120, 20.0, 70, 2100, 1250).team(Team::Ct)
            }
            WeaponId::Mp5 => Self::gun(id, "MP5-Navy", Smg, Auto, 30, 120, 26.0, 80, 2600, 1500),
            WeaponId::Ump45 => Self::gun(id, "UMP45", Smg, Auto, 25, 100, 30.0, 100, 3500, 1700),
            WeaponId::P90 => Self::gun(id, "P90", Smg, Auto, 50, 100, 21.0, 70, 3400, 2350),

            // Rifles
            WeaponId::Galil => {
                Self::gun(id, "Galil", Rifle, Auto, 35, 90, 30.0, 90, 2500, 2000).team(Team::T)
            }
            WeaponId::Famas => {
                Self::gun(id, "FAMAS", Rifle, Burst, 25, 90, 30.0, 90, 3300, 2250).team(Team::Ct)
            }
            WeaponId::Ak47 => {
                Self::gun(id, "AK-47", Rifle, Auto, 30, 90, 36.0, 100, 2500, 2500).team(Team::T)
            }
            WeaponId::M4a1 => {
                Self::gun(id, "M4A1", Rifle, Auto, 30, 90, 33.0, 90, 3100, 3100).team(Team::Ct)
            }
            WeaponId::Sg552 => {
                Self::gun(id, "SG-552", Rifle, Auto, 30, 90, 33.0, 90, 3000, 3500).team(Team::T)
            }
            WeaponId::Aug => {
                Self::gun(id, "AUG", Rifle, Auto, 30, 90, 32.0, 90, 3800, 3500).team(Team::Ct)
            }

            // Snipers
            WeaponId::Scout => {
                Self::gun(id, "Scout", Sniper, Bolt, 10, 90, 75.0, 1250, 2000, 2750).scoped()
            }
            WeaponId::Awp => {
                Self::gun(id, "AWP", Sniper, Bolt, 10, 30, 115.0, 1470, 3700, 4750).scoped()
            }
            WeaponId::G3sg1 => {
                Self::gun(id, "G3SG1", Sniper, Auto, 20, 90, 80.0, 240, 4200, 5000)
                    .scoped()
                    .team(Team::T)
            }
            WeaponId::Sg550 => {
                Self::gun(id, "SG-550", Sniper, Auto, 30, 90, 70.0, 240, 3500, 4200)
                    .scoped()
                    .team(Team::Ct)
            }

            // Machine gun
            WeaponId::M249 => {
                Self::gun(id, "M249", Machinegun, Auto, 100, 200, 32.0, 80, 5700, 5750)
            }
        }
    }

    pub fn slot(&self) -> WeaponSlot {
        self.category.slot()
    }

    pub fn is_buyable_by(&self, team: Team) -> bool {
        self.category != WeaponCategory::Melee && self.buy_team.map_or(true, |t| t == team)
    }
}

/// Lookup facade over the static weapon table
pub struct WeaponCatalog;

impl WeaponCatalog {
    /// Weapon handed out when a key cannot be resolved
    pub const FALLBACK: WeaponId = WeaponId::Knife;

    pub fn get(id: WeaponId) -> WeaponDefinition {
        WeaponDefinition::for_id(id)
    }

    /// Strict lookup by wire key
    pub fn lookup(key: &str) -> Result<WeaponDefinition, Refusal> {
        key.parse::<WeaponId>().map(Self::get)
    }

    /// Lenient lookup: unknown keys resolve to the fallback weapon
    pub fn resolve(key: &str) -> WeaponDefinition {
        Self::lookup(key).unwrap_or_else(|_| {
            warn!(weapon = key, fallback = %Self::FALLBACK, "Unknown weapon key, using fallback");
            Self::get(Self::FALLBACK)
        })
    }

    pub fn all() -> impl Iterator<Item = WeaponDefinition> {
        WeaponId::ALL.into_iter().map(Self::get)
    }

    /// Sidearm every player spawns with
    pub fn default_pistol(team: Team) -> WeaponDefinition {
        match team {
            Team::T => Self::get(WeaponId::Glock),
            Team::Ct => Self::get(WeaponId::Usp),
        }
    }
}
