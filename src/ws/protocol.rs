//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::bomb::BombState;
use crate::game::buy::BuyCategory;
use crate::game::combat::ProjectileSpawn;
use crate::game::player::{Aim, GrenadeKind, PlayerCombatState, Team};
use crate::game::refusal::Refusal;
use crate::game::round::{MatchPhase, MatchState, WinReason};
use crate::game::weapons::WeaponId;

/// Audience of a chat line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatChannel {
    #[default]
    All,
    Ct,
    T,
    Dead,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Enter a room, creating it if needed
    #[serde(rename = "room:join", rename_all = "camelCase")]
    RoomJoin {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    #[serde(rename = "room:leave", rename_all = "camelCase")]
    RoomLeave { room_id: String },

    /// Optimistic ready toggle, tagged with the client's command sequence
    #[serde(rename = "player:ready", rename_all = "camelCase")]
    PlayerReady {
        room_id: String,
        player_id: Uuid,
        ready: bool,
        #[serde(default)]
        seq: u32,
    },

    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage {
        sender: String,
        team: ChatChannel,
        text: String,
        room_id: String,
    },

    #[serde(rename = "team:select")]
    TeamSelect { team: Team },

    /// Position and facing, fed to projectile origins
    #[serde(rename = "input:aim")]
    Aim {
        #[serde(default)]
        seq: u32,
        x: f32,
        y: f32,
        angle: f32,
    },

    #[serde(rename = "input:trigger")]
    Trigger { pressed: bool },

    #[serde(rename = "input:reload")]
    Reload,

    #[serde(rename = "input:scope")]
    Scope,

    #[serde(rename = "input:switch", rename_all = "camelCase")]
    SwitchWeapon { weapon_id: String },

    /// Release a carried grenade along the current aim
    #[serde(rename = "input:throw")]
    ThrowGrenade { grenade: GrenadeKind },

    #[serde(rename = "buy:purchase", rename_all = "camelCase")]
    Purchase {
        category: BuyCategory,
        item_id: String,
    },

    /// Plant key pressed (`true`) or released (`false`)
    #[serde(rename = "bomb:plant")]
    Plant { active: bool },

    #[serde(rename = "bomb:defuse")]
    Defuse { active: bool },

    /// Hit resolved by the ballistics collaborator
    #[serde(rename = "combat:hit", rename_all = "camelCase")]
    Hit { target_id: Uuid, weapon_id: String },

    /// Ping for latency measurement
    #[serde(rename = "ping", rename_all = "camelCase")]
    Ping {
        /// Client timestamp
        t: u64,
        /// Client's last measured round trip
        #[serde(default)]
        rtt_ms: Option<u32>,
    },
}

impl ClientMsg {
    /// Action name used when reporting a refusal
    pub fn action(&self) -> &'static str {
        match self {
            ClientMsg::RoomJoin { .. } => "room:join",
            ClientMsg::RoomLeave { .. } => "room:leave",
            ClientMsg::PlayerReady { .. } => "player:ready",
            ClientMsg::ChatMessage { .. } => "chat:message",
            ClientMsg::TeamSelect { .. } => "team:select",
            ClientMsg::Aim { .. } => "input:aim",
            ClientMsg::Trigger { .. } => "input:trigger",
            ClientMsg::Reload => "input:reload",
            ClientMsg::Scope => "input:scope",
            ClientMsg::SwitchWeapon { .. } => "input:switch",
            ClientMsg::ThrowGrenade { .. } => "input:throw",
            ClientMsg::Purchase { .. } => "buy:purchase",
            ClientMsg::Plant { .. } => "bomb:plant",
            ClientMsg::Defuse { .. } => "bomb:defuse",
            ClientMsg::Hit { .. } => "combat:hit",
            ClientMsg::Ping { .. } => "ping",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Welcome message after connection
    #[serde(rename = "welcome", rename_all = "camelCase")]
    Welcome { player_id: Uuid, server_time: u64 },

    /// Authoritative roster
    #[serde(rename = "room:updated", rename_all = "camelCase")]
    RoomUpdated {
        room_id: String,
        players: Vec<RoomPlayerInfo>,
        /// Bumped on every roster change
        version: u64,
    },

    #[serde(rename = "chat:message")]
    ChatMessage {
        sender: String,
        team: ChatChannel,
        text: String,
    },

    /// Game state snapshot (sent at regular intervals)
    #[serde(rename = "match:snapshot")]
    MatchSnapshot {
        /// Server tick number
        tick: u64,
        state: MatchState,
        bomb: BombState,
        players: Vec<PlayerCombatState>,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// An action was rejected; the match carries on
    #[serde(rename = "action:refused")]
    ActionRefused { action: String, reason: Refusal },

    /// Error message
    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// Pong response
    #[serde(rename = "pong")]
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// One roster row of `room:updated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub team: Option<Team>,
    pub ready: bool,
    pub is_bot: bool,
    pub bot_difficulty: Option<String>,
    pub kills: u32,
    pub deaths: u32,
    pub ping: u32,
    /// Last client command sequence the server applied for this player
    #[serde(default)]
    pub last_seq: u32,
}

/// Game events (shots, kills, round flow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Projectiles to spawn
    Shot { projectiles: Vec<ProjectileSpawn> },

    /// Hit registered
    Hit {
        shooter_id: Uuid,
        target_id: Uuid,
        weapon_id: WeaponId,
        damage: f32,
    },

    /// Player killed
    Kill {
        killer_id: Option<Uuid>,
        victim_id: Uuid,
        weapon_id: WeaponId,
    },

    ReloadStarted { player_id: Uuid },
    ReloadCompleted { player_id: Uuid },

    /// Grenade leaves the hand; flight and effect are resolved elsewhere
    GrenadeThrown {
        player_id: Uuid,
        grenade: GrenadeKind,
        aim: Aim,
    },

    PhaseChanged { phase: MatchPhase, round: u32 },

    BombPlanted { planter_id: Uuid },
    BombDefused { defuser_id: Uuid },
    BombExploded,

    RoundEnded { winner: Team, reason: WinReason },
}
