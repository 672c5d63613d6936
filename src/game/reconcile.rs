//! Client-side reconciliation of predicted state with server snapshots
//!
//! Network callbacks only `enqueue`; authoritative messages are applied in
//! `drain`, once per local tick, so they never interleave with a fire or
//! reload computation in progress.

use std::collections::{HashMap, VecDeque};

use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{ChatChannel, ClientMsg, RoomPlayerInfo, ServerMsg};

use super::bomb::BombState;
use super::player::{PlayerCombatState, Team};
use super::round::MatchState;

/// Chat lines kept locally
pub const CHAT_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingReady {
    seq: u32,
    ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub channel: ChatChannel,
    pub text: String,
}

pub struct ReconciliationLayer {
    local_player_id: Uuid,
    room_id: Option<String>,
    next_seq: u32,

    /// Last roster received from the server
    authoritative: Vec<RoomPlayerInfo>,
    /// Authoritative roster with unacknowledged local commands on top
    roster: Vec<RoomPlayerInfo>,
    roster_version: u64,
    pending: Vec<PendingReady>,

    combat: HashMap<Uuid, PlayerCombatState>,
    match_state: Option<MatchState>,
    bomb: Option<BombState>,
    last_tick: u64,

    chat: VecDeque<ChatLine>,
    inbox: VecDeque<ServerMsg>,
}

impl ReconciliationLayer {
    pub fn new(local_player_id: Uuid) -> Self {
        Self {
            local_player_id,
            room_id: None,
            next_seq: 0,
            authoritative: Vec::new(),
            roster: Vec::new(),
            roster_version: 0,
            pending: Vec::new(),
            combat: HashMap::new(),
            match_state: None,
            bomb: None,
            last_tick: 0,
            chat: VecDeque::new(),
            inbox: VecDeque::new(),
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Enter a room, dropping everything known about the previous one
    pub fn join_room(&mut self, room_id: &str, name: Option<String>) -> ClientMsg {
        let local_player_id = self.local_player_id;
        *self = Self::new(local_player_id);
        self.room_id = Some(room_id.to_string());
        ClientMsg::RoomJoin {
            room_id: room_id.to_string(),
            name,
        }
    }

    pub fn leave_room(&mut self) -> Option<ClientMsg> {
        let room_id = self.room_id.take()?;
        *self = Self::new(self.local_player_id);
        Some(ClientMsg::RoomLeave { room_id })
    }

    /// Flip the local ready flag at once and return the command to send
    pub fn toggle_ready(&mut self, ready: bool) -> Option<ClientMsg> {
        let room_id = self.room_id.clone()?;
        self.next_seq += 1;
        let command = PendingReady {
            seq: self.next_seq,
            ready,
        };
        self.pending.push(command);
        self.apply_pending(command);

        Some(ClientMsg::PlayerReady {
            room_id,
            player_id: self.local_player_id,
            ready,
            seq: command.seq,
        })
    }

    pub fn send_chat(&self, sender: &str, channel: ChatChannel, text: &str) -> Option<ClientMsg> {
        Some(ClientMsg::ChatMessage {
            sender: sender.to_string(),
            team: channel,
            text: text.to_string(),
            room_id: self.room_id.clone()?,
        })
    }

    /// Queue a server message. Nothing is applied until `drain`.
    pub fn enqueue(&mut self, msg: ServerMsg) {
        self.inbox.push_back(msg);
    }

    /// Apply every queued message in arrival order. Returns how many were taken.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(msg) = self.inbox.pop_front() {
            self.apply(msg);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::RoomUpdated {
                room_id,
                players,
                version,
            } => self.apply_roster(room_id, players, version),
            ServerMsg::MatchSnapshot {
                tick,
                state,
                bomb,
                players,
                ..
            } => {
                if tick < self.last_tick {
                    return;
                }
                self.last_tick = tick;
                self.combat = players.into_iter().map(|p| (p.player_id, p)).collect();
                self.match_state = Some(state);
                self.bomb = Some(bomb);
            }
            ServerMsg::ChatMessage { sender, team, text } => {
                if !self.can_read(team) {
                    return;
                }
                if self.chat.len() == CHAT_LOG_LIMIT {
                    self.chat.pop_front();
                }
                self.chat.push_back(ChatLine {
                    sender,
                    channel: team,
                    text,
                });
            }
            _ => {}
        }
    }

    fn apply_roster(&mut self, room_id: String, players: Vec<RoomPlayerInfo>, version: u64) {
        if self.room_id.as_deref() != Some(room_id.as_str()) || version < self.roster_version {
            return;
        }
        self.roster_version = version;
        self.authoritative = players;

        let acked = self
            .authoritative
            .iter()
            .find(|p| p.id == self.local_player_id)
            .map_or(0, |p| p.last_seq);
        let confirmed_ready = self.local_row(&self.authoritative).map(|p| p.ready);

        self.pending.retain(|cmd| {
            if cmd.seq > acked {
                return true;
            }
            if confirmed_ready.is_some_and(|r| r != cmd.ready) {
                debug!(seq = cmd.seq, "Rolled back optimistic ready toggle");
            }
            false
        });

        self.roster = self.authoritative.clone();
        for cmd in self.pending.clone() {
            self.apply_pending(cmd);
        }
    }

    fn apply_pending(&mut self, cmd: PendingReady) {
        let id = self.local_player_id;
        if let Some(row) = self.roster.iter_mut().find(|p| p.id == id) {
            row.ready = cmd.ready;
        }
    }

    fn local_row<'a>(&self, rows: &'a [RoomPlayerInfo]) -> Option<&'a RoomPlayerInfo> {
        rows.iter().find(|p| p.id == self.local_player_id)
    }

    fn can_read(&self, channel: ChatChannel) -> bool {
        match channel {
            ChatChannel::All => true,
            ChatChannel::Ct => self.local_team() == Some(Team::Ct),
            ChatChannel::T => self.local_team() == Some(Team::T),
            ChatChannel::Dead => self
                .combat
                .get(&self.local_player_id)
                .is_some_and(|c| !c.is_alive),
        }
    }

    pub fn local_team(&self) -> Option<Team> {
        self.local_row(&self.roster).and_then(|p| p.team)
    }

    pub fn roster(&self) -> &[RoomPlayerInfo] {
        &self.roster
    }

    pub fn local_player(&self) -> Option<&RoomPlayerInfo> {
        self.local_row(&self.roster)
    }

    pub fn combat_state(&self, player_id: &Uuid) -> Option<&PlayerCombatState> {
        self.combat.get(player_id)
    }

    pub fn match_state(&self) -> Option<&MatchState> {
        self.match_state.as_ref()
    }

    pub fn bomb(&self) -> Option<&BombState> {
        self.bomb.as_ref()
    }

    pub fn chat(&self) -> impl Iterator<Item = &ChatLine> {
        self.chat.iter()
    }

    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::round::{MatchRules, RoundPhaseController};

    fn row(id: Uuid, ready: bool, last_seq: u32, team: Option<Team>) -> RoomPlayerInfo {
        RoomPlayerInfo {
            id,
            name: "me".into(),
            team,
            ready,
            is_bot: false,
            bot_difficulty: None,
            kills: 0,
            deaths: 0,
            ping: 0,
            last_seq,
        }
    }

    fn roster_msg(players: Vec<RoomPlayerInfo>, version: u64) -> ServerMsg {
        ServerMsg::RoomUpdated {
            room_id: "dust2".into(),
            players,
            version,
        }
    }

    fn joined() -> (ReconciliationLayer, Uuid) {
        let me = Uuid::new_v4();
        let mut layer = ReconciliationLayer::new(me);
        layer.join_room("dust2", None);
        layer.enqueue(roster_msg(vec![row(me, false, 0, None)], 1));
        layer.drain();
        (layer, me)
    }

    #[test]
    fn ready_toggle_is_applied_optimistically() {
        let (mut layer, me) = joined();
        let msg = layer.toggle_ready(true).unwrap();
        assert!(matches!(msg, ClientMsg::PlayerReady { seq: 1, ready: true, player_id, .. } if player_id == me));
        assert!(layer.local_player().unwrap().ready);
        assert_eq!(layer.pending_commands(), 1);
    }

    #[test]
    fn nothing_applies_before_drain() {
        let (mut layer, me) = joined();
        layer.enqueue(roster_msg(vec![row(me, true, 0, Some(Team::T))], 2));
        assert_eq!(layer.local_team(), None);
        assert_eq!(layer.drain(), 1);
        assert_eq!(layer.local_team(), Some(Team::T));
    }

    #[test]
    fn acknowledged_command_adopts_server_value() {
        let (mut layer, me) = joined();
        layer.toggle_ready(true);

        // Server applied seq 1 but still reports not ready: roll back
        layer.enqueue(roster_msg(vec![row(me, false, 1, None)], 2));
        layer.drain();
        assert!(!layer.local_player().unwrap().ready);
        assert_eq!(layer.pending_commands(), 0);
    }

    #[test]
    fn unacknowledged_commands_are_replayed() {
        let (mut layer, me) = joined();
        layer.toggle_ready(true);
        layer.toggle_ready(false);
        layer.toggle_ready(true);

        layer.enqueue(roster_msg(vec![row(me, false, 2, None)], 2));
        layer.drain();
        assert!(layer.local_player().unwrap().ready);
        assert_eq!(layer.pending_commands(), 1);
    }

    #[test]
    fn older_roster_versions_are_ignored() {
        let (mut layer, me) = joined();
        layer.enqueue(roster_msg(vec![row(me, true, 0, Some(Team::Ct))], 5));
        layer.enqueue(roster_msg(vec![row(me, false, 0, None)], 4));
        layer.drain();
        assert_eq!(layer.local_team(), Some(Team::Ct));
    }

    #[test]
    fn snapshot_overwrites_combat_state_wholesale() {
        let (mut layer, me) = joined();
        let round = RoundPhaseController::new(MatchRules::default(), 1);

        let mut predicted = PlayerCombatState::new(me, Team::T, 800);
        predicted.current_ammo = 3;
        let server = PlayerCombatState::new(me, Team::T, 800);

        layer.enqueue(ServerMsg::MatchSnapshot {
            tick: 10,
            state: round.state.clone(),
            bomb: round.bomb.state.clone(),
            players: vec![predicted],
            events: Vec::new(),
        });
        layer.enqueue(ServerMsg::MatchSnapshot {
            tick: 11,
            state: round.state.clone(),
            bomb: round.bomb.state.clone(),
            players: vec![server.clone()],
            events: Vec::new(),
        });
        layer.drain();
        assert_eq!(layer.combat_state(&me), Some(&server));
        assert_eq!(layer.match_state(), Some(&round.state));
    }

    #[test]
    fn team_chat_is_filtered_and_log_is_bounded() {
        let (mut layer, me) = joined();
        layer.enqueue(roster_msg(vec![row(me, false, 0, Some(Team::Ct))], 2));
        for channel in [ChatChannel::All, ChatChannel::T, ChatChannel::Ct] {
            layer.enqueue(ServerMsg::ChatMessage {
                sender: "x".into(),
                team: channel,
                text: "hi".into(),
            });
        }
        layer.drain();
        let channels: Vec<ChatChannel> = layer.chat().map(|l| l.channel).collect();
        assert_eq!(channels, vec![ChatChannel::All, ChatChannel::Ct]);

        for i in 0..CHAT_LOG_LIMIT + 5 {
            layer.enqueue(ServerMsg::ChatMessage {
                sender: "x".into(),
                team: ChatChannel::All,
                text: i.to_string(),
            });
        }
        layer.drain();
        assert_eq!(layer.chat().count(), CHAT_LOG_LIMIT);
        assert_eq!(layer.chat().last().unwrap().text, (CHAT_LOG_LIMIT + 4).to_string());
    }

    #[test]
    fn leaving_clears_room_state() {
        let (mut layer, _) = joined();
        assert_eq!(
            layer.leave_room(),
            Some(ClientMsg::RoomLeave {
                room_id: "dust2".into()
            })
        );
        assert!(layer.roster().is_empty());
        assert!(layer.toggle_ready(true).is_none());
    }
}
