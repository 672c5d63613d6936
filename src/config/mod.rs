//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::round::MatchRules;
use crate::game::RoomSettings;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,

    pub max_players_per_room: usize,
    pub freeze_time_ms: u64,
    pub round_time_ms: u64,
    pub round_end_delay_ms: u64,
    pub start_money: u32,
    /// Fixed seed for every room; random per room when unset
    pub match_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let rules = MatchRules::default();
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: "http://localhost:5173".to_string(),
            max_players_per_room: 10,
            freeze_time_ms: rules.freeze_time_ms,
            round_time_ms: rules.round_time_ms,
            round_end_delay_ms: rules.round_end_delay_ms,
            start_money: rules.start_money,
            match_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match (env::var("PORT"), env::var("SERVER_ADDR")) {
            (Ok(port), _) => format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            (_, Ok(addr)) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
            _ => defaults.server_addr,
        };

        let match_seed = match env::var("MATCH_SEED") {
            Ok(raw) => Some(parse_var("MATCH_SEED", &raw)?),
            Err(_) => None,
        };

        let config = Self {
            server_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
            max_players_per_room: var_or("MAX_PLAYERS_PER_ROOM", defaults.max_players_per_room)?,
            freeze_time_ms: var_or("FREEZE_TIME_MS", defaults.freeze_time_ms)?,
            round_time_ms: var_or("ROUND_TIME_MS", defaults.round_time_ms)?,
            round_end_delay_ms: var_or("ROUND_END_DELAY_MS", defaults.round_end_delay_ms)?,
            start_money: var_or("START_MONEY", defaults.start_money)?,
            match_seed,
        };

        if config.max_players_per_room == 0 {
            return Err(ConfigError::Invalid("MAX_PLAYERS_PER_ROOM"));
        }
        Ok(config)
    }

    /// Settings handed to every new room
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            rules: MatchRules {
                freeze_time_ms: self.freeze_time_ms,
                round_time_ms: self.round_time_ms,
                round_end_delay_ms: self.round_end_delay_ms,
                start_money: self.start_money,
            },
            max_players: self.max_players_per_room,
            seed: self.match_seed,
        }
    }
}

fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
