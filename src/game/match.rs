//! Room registry and the authoritative tick loop

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{unix_millis, Timer, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ChatChannel, ClientMsg, ServerMsg};

use super::context::{JoinError, MatchContext};
use super::player::{Aim, Team};
use super::refusal::Refusal;
use super::round::{MatchPhase, MatchRules};
use super::snapshot::SnapshotBuilder;
use super::PlayerInput;

/// Longest chat line relayed, in characters
pub const CHAT_MAX_LEN: usize = 200;

/// Inputs queued longer than one tick get logged
const INPUT_LAG_WARN_MS: u64 = 1_000 / SIMULATION_TPS as u64;

/// A server message and the player it is meant for (`None` = everyone)
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Option<Uuid>,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn is_for(&self, player_id: &Uuid) -> bool {
        self.target.map_or(true, |t| t == *player_id)
    }
}

/// Room settings shared by every room the registry creates
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    pub rules: MatchRules,
    pub max_players: usize,
    /// Fixed seed for reproducible rooms; random when unset
    pub seed: Option<u64>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            rules: MatchRules::default(),
            max_players: 10,
            seed: None,
        }
    }
}

/// Published view of a room for HTTP listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub phase: MatchPhase,
    pub player_count: usize,
    pub max_players: usize,
    pub ct_score: u32,
    pub t_score: u32,
    pub current_round: u32,
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    /// Distinguishes a room from a later one reusing its id
    instance: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub broadcast_tx: broadcast::Sender<Outbound>,
    summary: Arc<RwLock<RoomSummary>>,
}

impl RoomHandle {
    pub fn summary(&self) -> RoomSummary {
        self.summary.read().clone()
    }

    pub fn player_count(&self) -> usize {
        self.summary.read().player_count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.broadcast_tx.subscribe()
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: DashMap::new(),
            settings,
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Look up a room, spawning its task on first use
    pub fn get_or_create(self: &Arc<Self>, id: &str) -> RoomHandle {
        match self.rooms.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (room, handle) = GameRoom::new(id, &self.settings);
                entry.insert(handle.clone());

                let registry = Arc::clone(self);
                let (room_id, instance) = (handle.id.clone(), handle.instance);
                tokio::spawn(async move {
                    room.run().await;
                    registry.remove(&room_id, instance);
                });
                handle
            }
        }
    }

    fn remove(&self, id: &str, instance: Uuid) {
        self.rooms.remove_if(id, |_, handle| handle.instance == instance);
    }

    /// Summaries ordered by room id
    pub fn list(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self.rooms.iter().map(|r| r.value().summary()).collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}

/// The authoritative game room
pub struct GameRoom {
    ctx: MatchContext,
    input_rx: mpsc::Receiver<PlayerInput>,
    broadcast_tx: broadcast::Sender<Outbound>,
    snapshot_builder: SnapshotBuilder,
    summary: Arc<RwLock<RoomSummary>>,
    tick: u64,
    /// Set once the first player joins; an empty room closes only after that
    occupied: bool,
}

impl GameRoom {
    pub fn new(id: &str, settings: &RoomSettings) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(256);

        let seed = settings.seed.unwrap_or_else(rand::random);
        let ctx = MatchContext::new(id, settings.rules, seed, settings.max_players);
        let summary = Arc::new(RwLock::new(RoomSummary {
            room_id: id.to_string(),
            phase: ctx.phase(),
            player_count: 0,
            max_players: settings.max_players,
            ct_score: 0,
            t_score: 0,
            current_round: ctx.round.state.current_round,
        }));

        let handle = RoomHandle {
            id: id.to_string(),
            instance: Uuid::new_v4(),
            input_tx,
            broadcast_tx: broadcast_tx.clone(),
            summary: summary.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let room = Self {
            ctx,
            input_rx,
            broadcast_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            summary,
            tick: 0,
            occupied: false,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop until the last player leaves
    pub async fn run(mut self) {
        info!(room_id = %self.ctx.room_id, "Room opened");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let clock = Timer::new();

        loop {
            tick_interval.tick().await;

            if !self.step(clock.elapsed_ms()) {
                break;
            }
        }

        info!(room_id = %self.ctx.room_id, rounds = self.ctx.round.state.current_round, "Room closed");
    }

    /// One tick. Returns false once the room should close.
    fn step(&mut self, now_ms: u64) -> bool {
        self.tick += 1;

        // Drain input queue
        self.process_inputs(now_ms);

        let events = self.ctx.tick(now_ms);
        self.snapshot_builder.record(events);

        if let Some(update) = self.snapshot_builder.roster_update(&self.ctx) {
            self.broadcast(update);
        }
        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(self.tick, &self.ctx);
            self.broadcast(snapshot);
        }
        self.publish_summary();

        !(self.occupied && self.ctx.player_count() == 0)
    }

    /// Process all pending inputs from players
    fn process_inputs(&mut self, now_ms: u64) {
        let wall_ms = unix_millis();
        while let Ok(input) = self.input_rx.try_recv() {
            let queued_ms = input.queued_for_ms(wall_ms);
            if queued_ms > INPUT_LAG_WARN_MS {
                debug!(room_id = %self.ctx.room_id, player_id = %input.player_id, action = input.msg.action(), queued_ms, "Input waited more than a tick");
            }
            self.handle_input(input, now_ms);
        }
    }

    fn handle_input(&mut self, input: PlayerInput, now_ms: u64) {
        let id = input.player_id;
        let action = input.msg.action();

        let result = match input.msg {
            ClientMsg::RoomJoin { name, .. } => {
                self.handle_join(id, name);
                Ok(())
            }
            ClientMsg::RoomLeave { .. } => {
                self.ctx.remove_player(&id);
                Ok(())
            }
            ClientMsg::PlayerReady {
                player_id,
                ready,
                seq,
                ..
            } => {
                if player_id != id {
                    warn!(room_id = %self.ctx.room_id, player_id = %id, claimed = %player_id, "Ready toggle for another player");
                    Err(Refusal::UnknownPlayer)
                } else {
                    self.ctx.set_ready(&id, ready, seq)
                }
            }
            ClientMsg::ChatMessage { team, text, .. } => self.relay_chat(id, team, &text),
            ClientMsg::TeamSelect { team } => self.ctx.select_team(&id, team, now_ms),
            ClientMsg::Aim { seq, x, y, angle } => self.ctx.set_aim(&id, seq, Aim { x, y, angle }),
            ClientMsg::Trigger { pressed: true } => self.ctx.press_trigger(&id, now_ms),
            ClientMsg::Trigger { pressed: false } => self.ctx.release_trigger(&id),
            ClientMsg::Reload => self.ctx.reload(&id, now_ms),
            ClientMsg::Scope => self.ctx.toggle_scope(&id).map(|_| ()),
            ClientMsg::SwitchWeapon { weapon_id } => self.ctx.switch_weapon(&id, &weapon_id),
            ClientMsg::ThrowGrenade { grenade } => self.ctx.throw_grenade(&id, grenade),
            ClientMsg::Purchase { category, item_id } => {
                self.ctx.purchase(&id, category, &item_id).map(|_| ())
            }
            ClientMsg::Plant { active } => self.ctx.plant(&id, active, now_ms),
            ClientMsg::Defuse { active } => self.ctx.defuse(&id, active, now_ms),
            ClientMsg::Hit {
                target_id,
                weapon_id,
            } => self.ctx.report_hit(&id, &target_id, &weapon_id),
            ClientMsg::Ping { t, rtt_ms } => {
                if let Some(rtt) = rtt_ms {
                    self.ctx.set_ping(&id, rtt);
                }
                self.send_to(id, ServerMsg::Pong { t });
                Ok(())
            }
        };

        if let Err(reason) = result {
            debug!(room_id = %self.ctx.room_id, player_id = %id, action, ?reason, "Action refused");
            self.send_to(
                id,
                ServerMsg::ActionRefused {
                    action: action.to_string(),
                    reason,
                },
            );
        }
    }

    fn handle_join(&mut self, id: Uuid, name: Option<String>) {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Player_{}", &id.simple().to_string()[..8]));

        let Err(err) = self.ctx.add_player(id, name) else {
            self.occupied = true;
            return;
        };
        let code = match err {
            JoinError::RoomFull => "room_full",
            JoinError::AlreadyJoined => "already_joined",
        };
        self.send_to(
            id,
            ServerMsg::Error {
                code: code.to_string(),
                message: err.to_string(),
            },
        );
    }

    /// Relay a chat line to its audience under the sender's roster name
    fn relay_chat(&mut self, id: Uuid, channel: ChatChannel, text: &str) -> Result<(), Refusal> {
        let sender = self.ctx.players.get(&id).ok_or(Refusal::UnknownPlayer)?;
        let text: String = text.trim().chars().take(CHAT_MAX_LEN).collect();
        if text.is_empty() {
            return Ok(());
        }

        let audience: Option<Vec<Uuid>> = match channel {
            ChatChannel::All => None,
            ChatChannel::Ct | ChatChannel::T => {
                let team = if channel == ChatChannel::Ct { Team::Ct } else { Team::T };
                if sender.team() != Some(team) {
                    return Err(Refusal::WrongTeamOrState);
                }
                Some(self.recipients(|p| p.team() == Some(team)))
            }
            ChatChannel::Dead => {
                if sender.is_alive() {
                    return Err(Refusal::WrongTeamOrState);
                }
                Some(self.recipients(|p| !p.is_alive()))
            }
        };

        let msg = ServerMsg::ChatMessage {
            sender: sender.name.clone(),
            team: channel,
            text,
        };
        match audience {
            None => self.broadcast(msg),
            Some(ids) => {
                for target in ids {
                    self.send_to(target, msg.clone());
                }
            }
        }
        Ok(())
    }

    fn recipients(&self, filter: impl Fn(&super::player::MatchPlayer) -> bool) -> Vec<Uuid> {
        self.ctx
            .players
            .values()
            .filter(|p| filter(p))
            .map(|p| p.id)
            .collect()
    }

    fn publish_summary(&self) {
        let mut summary = self.summary.write();
        summary.phase = self.ctx.phase();
        summary.player_count = self.ctx.player_count();
        summary.ct_score = self.ctx.round.state.ct_score;
        summary.t_score = self.ctx.round.state.t_score;
        summary.current_round = self.ctx.round.state.current_round;
    }

    fn broadcast(&self, msg: ServerMsg) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(Outbound { target: None, msg });
    }

    fn send_to(&self, player_id: Uuid, msg: ServerMsg) {
        let _ = self.broadcast_tx.send(Outbound {
            target: Some(player_id),
            msg,
        });
    }
}
