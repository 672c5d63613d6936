//! Game simulation modules

pub mod ammo;
pub mod bomb;
pub mod buy;
pub mod combat;
pub mod constants;
pub mod context;
pub mod economy;
pub mod r#match;
pub mod player;
pub mod reconcile;
pub mod refusal;
pub mod round;
pub mod scope;
pub mod snapshot;
pub mod weapons;

pub use context::MatchContext;
pub use r#match::{Outbound, RoomHandle, RoomRegistry, RoomSettings, RoomSummary};
pub use refusal::Refusal;

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    /// Wall-clock millis when the socket task read the message
    pub received_at: u64,
}

impl PlayerInput {
    /// Time spent waiting for the room task to drain this input
    pub fn queued_for_ms(&self, now_unix_ms: u64) -> u64 {
        now_unix_ms.saturating_sub(self.received_at)
    }
}
