//! Gameplay tuning constants

/// Shots fired by one pull of a burst weapon
pub const BURST_SHOTS: u32 = 3;
/// Spacing between the shots of a burst
pub const BURST_SHOT_INTERVAL_MS: u64 = 50;

/// Emission delay of the second pistol of a dual pair
pub const DUAL_PAIR_OFFSET_MS: u64 = 50;
/// Angular offset of each hand of a dual pair (radians)
pub const DUAL_ANGLE_OFFSET: f32 = 0.05;

/// Movement multiplier while zoomed
pub const SCOPED_SPEED_MULTIPLIER: f32 = 0.5;

// Bomb
pub const PLANT_TIME_MS: u64 = 3_000;
pub const DEFUSE_TIME_MS: u64 = 10_000;
pub const DEFUSE_KIT_TIME_MS: u64 = 5_000;
pub const BOMB_TIMER_DEFAULT_MS: u64 = 40_000;

// Economy
pub const WIN_REWARD: u32 = 3_250;
pub const LOSS_REWARD: u32 = 1_400;
pub const START_MONEY: u32 = 800;
pub const MAX_MONEY: u32 = 16_000;
pub const PLANT_BONUS: u32 = 800;
pub const DEFUSE_BONUS: u32 = 300;

// Kill rewards by weapon category
pub const KILL_REWARD: u32 = 300;
pub const KILL_REWARD_MELEE: u32 = 1_500;
pub const KILL_REWARD_SMG: u32 = 600;
pub const KILL_REWARD_SHOTGUN: u32 = 900;
pub const KILL_REWARD_SNIPER: u32 = 100;

// Round timing defaults (overridable through config)
pub const FREEZE_TIME_MS: u64 = 15_000;
pub const ROUND_TIME_MS: u64 = 115_000;
pub const ROUND_END_DELAY_MS: u64 = 5_000;

// Player
pub const MAX_HEALTH: f32 = 100.0;
pub const MAX_ARMOR: f32 = 100.0;
/// Fraction of incoming damage soaked by armor
pub const ARMOR_ABSORPTION: f32 = 0.5;
