//! Player combat state and room roster entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::{ARMOR_ABSORPTION, MAX_HEALTH};
use super::refusal::Refusal;
use super::weapons::{WeaponCatalog, WeaponDefinition, WeaponId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Ct,
    T,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Ct => Team::T,
            Team::T => Team::Ct,
        }
    }
}

/// Where the player stands and points, fed by client input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aim {
    pub x: f32,
    pub y: f32,
    /// Radians
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrenadeKind {
    #[serde(rename = "hegrenade")]
    He,
    #[serde(rename = "flashbang")]
    Flashbang,
    #[serde(rename = "smokegrenade")]
    Smoke,
}

impl GrenadeKind {
    /// How many of this kind one player may carry
    pub fn carry_limit(self) -> u32 {
        match self {
            GrenadeKind::Flashbang => 2,
            GrenadeKind::He | GrenadeKind::Smoke => 1,
        }
    }
}

/// Grenades on hand. Throwing is resolved by the ballistics collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrenadePouch {
    pub he_grenades: u32,
    pub flashbangs: u32,
    pub smoke_grenades: u32,
}

impl GrenadePouch {
    fn slot_mut(&mut self, kind: GrenadeKind) -> &mut u32 {
        match kind {
            GrenadeKind::He => &mut self.he_grenades,
            GrenadeKind::Flashbang => &mut self.flashbangs,
            GrenadeKind::Smoke => &mut self.smoke_grenades,
        }
    }

    pub fn count(&self, kind: GrenadeKind) -> u32 {
        match kind {
            GrenadeKind::He => self.he_grenades,
            GrenadeKind::Flashbang => self.flashbangs,
            GrenadeKind::Smoke => self.smoke_grenades,
        }
    }

    pub fn is_full(&self, kind: GrenadeKind) -> bool {
        self.count(kind) >= kind.carry_limit()
    }

    /// Add one grenade. False when the kind is already at its limit.
    pub fn add(&mut self, kind: GrenadeKind) -> bool {
        if self.is_full(kind) {
            return false;
        }
        *self.slot_mut(kind) += 1;
        true
    }

    /// Remove one grenade. False when none is carried.
    pub fn take(&mut self, kind: GrenadeKind) -> bool {
        let slot = self.slot_mut(kind);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }
}

/// A carried but not equipped weapon, with its own ammo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolsteredWeapon {
    pub weapon_id: WeaponId,
    pub ammo: u32,
    pub reserve: u32,
}

/// Per-player combat state (authoritative on the server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCombatState {
    pub player_id: Uuid,
    pub team: Team,

    // Equipped weapon
    pub current_weapon_id: WeaponId,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
    pub holstered: Vec<HolsteredWeapon>,

    // Weapon timers
    pub is_reloading: bool,
    pub reload_started_at_ms: u64,
    pub last_shot_at_ms: Option<u64>,
    pub burst_shots_remaining: u32,
    pub next_burst_shot_at_ms: u64,
    pub trigger_held: bool,

    // Scope
    pub is_scoped: bool,
    pub scope_speed_multiplier: f32,

    // Vitals and equipment
    pub is_alive: bool,
    pub health: f32,
    pub armor: f32,
    pub has_helmet: bool,
    pub has_defuse_kit: bool,
    #[serde(default)]
    pub grenades: GrenadePouch,
    pub money: u32,

    pub aim: Aim,
}

impl PlayerCombatState {
    /// Fresh state with the default loadout: team pistol equipped, knife holstered
    pub fn new(player_id: Uuid, team: Team, money: u32) -> Self {
        let pistol = WeaponCatalog::default_pistol(team);
        let mut state = Self {
            player_id,
            team,
            current_weapon_id: pistol.id,
            current_ammo: pistol.magazine_size,
            reserve_ammo: pistol.reserve_cap,
            holstered: Vec::new(),
            is_reloading: false,
            reload_started_at_ms: 0,
            last_shot_at_ms: None,
            burst_shots_remaining: 0,
            next_burst_shot_at_ms: 0,
            trigger_held: false,
            is_scoped: false,
            scope_speed_multiplier: 1.0,
            is_alive: true,
            health: MAX_HEALTH,
            armor: 0.0,
            has_helmet: false,
            has_defuse_kit: false,
            grenades: GrenadePouch::default(),
            money,
            aim: Aim::default(),
        };
        state.holster(WeaponCatalog::get(WeaponCatalog::FALLBACK));
        state
    }

    pub fn weapon(&self) -> WeaponDefinition {
        WeaponCatalog::get(self.current_weapon_id)
    }

    pub fn carries(&self, weapon_id: WeaponId) -> bool {
        self.current_weapon_id == weapon_id
            || self.holstered.iter().any(|h| h.weapon_id == weapon_id)
    }

    /// Drop every in-flight weapon action (reload, burst, trigger, scope)
    pub fn clear_transient(&mut self) {
        self.is_reloading = false;
        self.burst_shots_remaining = 0;
        self.trigger_held = false;
        self.is_scoped = false;
        self.scope_speed_multiplier = 1.0;
    }

    fn holster(&mut self, weapon: WeaponDefinition) {
        self.holstered.retain(|h| h.weapon_id != weapon.id);
        self.holstered.push(HolsteredWeapon {
            weapon_id: weapon.id,
            ammo: weapon.magazine_size,
            reserve: weapon.reserve_cap,
        });
    }

    /// Equip a newly acquired weapon with full ammo.
    ///
    /// Whatever occupied the same slot (equipped or holstered) is discarded.
    pub fn give_weapon(&mut self, weapon: WeaponDefinition) {
        let slot = weapon.slot();
        self.holstered
            .retain(|h| WeaponCatalog::get(h.weapon_id).slot() != slot);

        if self.weapon().slot() != slot {
            self.holstered.push(HolsteredWeapon {
                weapon_id: self.current_weapon_id,
                ammo: self.current_ammo,
                reserve: self.reserve_ammo,
            });
        }

        self.clear_transient();
        self.current_weapon_id = weapon.id;
        self.current_ammo = weapon.magazine_size;
        self.reserve_ammo = weapon.reserve_cap;
    }

    /// Swap the equipped weapon for a holstered one, keeping each weapon's ammo
    pub fn switch_weapon(&mut self, weapon_id: WeaponId) -> Result<(), Refusal> {
        if !self.is_alive {
            return Err(Refusal::NotAlive);
        }
        if weapon_id == self.current_weapon_id {
            return Ok(());
        }

        let idx = self
            .holstered
            .iter()
            .position(|h| h.weapon_id == weapon_id)
            .ok_or(Refusal::NotCarried)?;

        let next = self.holstered.remove(idx);
        self.holstered.push(HolsteredWeapon {
            weapon_id: self.current_weapon_id,
            ammo: self.current_ammo,
            reserve: self.reserve_ammo,
        });

        self.clear_transient();
        self.current_weapon_id = next.weapon_id;
        self.current_ammo = next.ammo;
        self.reserve_ammo = next.reserve;
        Ok(())
    }

    /// Bring the player back for a new round.
    ///
    /// Survivors keep their weapons; the dead restart with the default loadout.
    pub fn respawn(&mut self) {
        if !self.is_alive {
            let fresh = Self::new(self.player_id, self.team, self.money);
            *self = Self { aim: self.aim, ..fresh };
            return;
        }

        self.clear_transient();
        self.health = MAX_HEALTH;
        self.last_shot_at_ms = None;
    }

    /// Apply incoming damage, armor soaking part of it. Returns true on the killing blow.
    pub fn apply_damage(&mut self, damage: f32) -> bool {
        if !self.is_alive {
            return false;
        }

        let absorbed = if self.armor > 0.0 {
            (damage * ARMOR_ABSORPTION).min(self.armor)
        } else {
            0.0
        };
        self.armor -= absorbed;
        self.health = (self.health - (damage - absorbed)).max(0.0);

        if self.health <= 0.0 {
            self.is_alive = false;
            self.has_defuse_kit = false;
            self.grenades = GrenadePouch::default();
            self.clear_transient();
            return true;
        }
        false
    }
}

/// Roster entry for one connected player
#[derive(Debug, Clone)]
pub struct MatchPlayer {
    pub id: Uuid,
    pub name: String,
    pub ready: bool,
    pub is_bot: bool,
    pub bot_difficulty: Option<String>,
    pub kills: u32,
    pub deaths: u32,
    pub ping: u32,
    /// Last client command sequence applied
    pub last_seq: u32,
    /// Last aim input sequence, stale inputs are dropped
    pub last_input_seq: u32,
    /// Absent until the player picks a team
    pub combat: Option<PlayerCombatState>,
}

impl MatchPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            ready: false,
            is_bot: false,
            bot_difficulty: None,
            kills: 0,
            deaths: 0,
            ping: 0,
            last_seq: 0,
            last_input_seq: 0,
            combat: None,
        }
    }

    pub fn team(&self) -> Option<Team> {
        self.combat.as_ref().map(|c| c.team)
    }

    pub fn is_alive(&self) -> bool {
        self.combat.as_ref().is_some_and(|c| c.is_alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_loadout_depends_on_team() {
        let t = PlayerCombatState::new(Uuid::new_v4(), Team::T, 800);
        assert_eq!(t.current_weapon_id, WeaponId::Glock);
        assert_eq!(t.current_ammo, 20);
        assert!(t.carries(WeaponId::Knife));

        let ct = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        assert_eq!(ct.current_weapon_id, WeaponId::Usp);
    }

    #[test]
    fn switching_keeps_each_weapons_ammo() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::T, 800);
        state.current_ammo = 5;
        state.is_scoped = true;

        state.switch_weapon(WeaponId::Knife).unwrap();
        assert_eq!(state.current_weapon_id, WeaponId::Knife);
        assert!(!state.is_scoped);

        state.switch_weapon(WeaponId::Glock).unwrap();
        assert_eq!(state.current_ammo, 5);
        assert_eq!(state.switch_weapon(WeaponId::Awp), Err(Refusal::NotCarried));
    }

    #[test]
    fn buying_a_primary_holsters_the_pistol() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::T, 800);
        state.give_weapon(WeaponCatalog::get(WeaponId::Ak47));
        assert_eq!(state.current_weapon_id, WeaponId::Ak47);
        assert_eq!(state.current_ammo, 30);
        assert_eq!(state.reserve_ammo, 90);
        assert!(state.carries(WeaponId::Glock));

        state.give_weapon(WeaponCatalog::get(WeaponId::Awp));
        assert!(!state.carries(WeaponId::Ak47));
        assert!(state.carries(WeaponId::Glock));
    }

    #[test]
    fn buying_a_pistol_replaces_the_old_pistol() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        state.give_weapon(WeaponCatalog::get(WeaponId::Deagle));
        assert_eq!(state.current_weapon_id, WeaponId::Deagle);
        assert!(!state.carries(WeaponId::Usp));
        assert!(state.carries(WeaponId::Knife));
    }

    #[test]
    fn armor_soaks_half_the_damage() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        state.armor = 100.0;
        assert!(!state.apply_damage(40.0));
        assert_eq!(state.health, 80.0);
        assert_eq!(state.armor, 80.0);
    }

    #[test]
    fn lethal_damage_kills_and_drops_kit() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::Ct, 800);
        state.has_defuse_kit = true;
        assert!(state.apply_damage(150.0));
        assert!(!state.is_alive);
        assert_eq!(state.health, 0.0);
        assert!(!state.has_defuse_kit);
        assert!(!state.apply_damage(10.0));
    }

    #[test]
    fn dead_players_respawn_with_default_loadout() {
        let mut state = PlayerCombatState::new(Uuid::new_v4(), Team::T, 800);
        state.give_weapon(WeaponCatalog::get(WeaponId::Ak47));
        state.money = 4000;
        state.apply_damage(500.0);

        state.respawn();
        assert!(state.is_alive);
        assert_eq!(state.current_weapon_id, WeaponId::Glock);
        assert_eq!(state.money, 4000);

        state.give_weapon(WeaponCatalog::get(WeaponId::Ak47));
        state.health = 12.0;
        state.respawn();
        assert_eq!(state.current_weapon_id, WeaponId::Ak47);
        assert_eq!(state.health, MAX_HEALTH);
    }
}
