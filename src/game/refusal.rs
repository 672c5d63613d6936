//! Typed refusals for gameplay actions
//!
//! Every refused action is reported to the acting player and the match
//! carries on. None of these are fatal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Refusal {
    #[error("player is not alive")]
    NotAlive,

    #[error("weapon is not ready to fire")]
    OnCooldown,

    #[error("magazine is empty")]
    NoAmmo,

    #[error("already reloading")]
    AlreadyReloading,

    #[error("magazine is already full")]
    MagazineFull,

    #[error("no reserve ammo left")]
    NoReserveAmmo,

    #[error("weapon must be scoped to fire")]
    NotScoped,

    #[error("weapon has no scope")]
    NoScope,

    #[error("combat is disabled in the current phase")]
    CombatDisabled,

    #[error("purchases are only accepted during freeze time")]
    NotBuyPhase,

    #[error("not enough money")]
    InsufficientFunds,

    #[error("wrong team or state for this action")]
    WrongTeamOrState,

    #[error("unknown weapon or item")]
    UnknownWeapon,

    #[error("weapon is not carried")]
    NotCarried,

    #[error("player is not in this room")]
    UnknownPlayer,
}
