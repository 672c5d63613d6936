//! Snapshot building for network transmission

use crate::ws::protocol::{GameEvent, ServerMsg};

use super::context::MatchContext;

/// Decides when to publish and builds the outgoing messages
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Roster version last published as `room:updated`
    published_roster: Option<u64>,
    /// Events held back until the next snapshot goes out
    pending_events: Vec<GameEvent>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            published_roster: None,
            pending_events: Vec::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase changes and kills)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Queue tick events for the next snapshot
    pub fn record(&mut self, events: Vec<GameEvent>) {
        let urgent = events.iter().any(|e| {
            matches!(
                e,
                GameEvent::PhaseChanged { .. }
                    | GameEvent::Kill { .. }
                    | GameEvent::RoundEnded { .. }
                    | GameEvent::BombPlanted { .. }
            )
        });
        self.pending_events.extend(events);
        if urgent {
            self.force_next();
        }
    }

    /// Build a snapshot message, flushing queued events
    pub fn build(&mut self, tick: u64, ctx: &MatchContext) -> ServerMsg {
        ServerMsg::MatchSnapshot {
            tick,
            state: ctx.round.state.clone(),
            bomb: ctx.round.bomb.state.clone(),
            players: ctx.combat_states(),
            events: std::mem::take(&mut self.pending_events),
        }
    }

    /// `room:updated` when the roster changed since the last call
    pub fn roster_update(&mut self, ctx: &MatchContext) -> Option<ServerMsg> {
        let version = ctx.roster_version();
        if self.published_roster == Some(version) {
            return None;
        }
        self.published_roster = Some(version);
        Some(ServerMsg::RoomUpdated {
            room_id: ctx.room_id.clone(),
            players: ctx.roster(),
            version,
        })
    }
}
