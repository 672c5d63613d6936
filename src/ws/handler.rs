//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{PlayerInput, RoomHandle};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Longest accepted room id
const MAX_ROOM_ID_LEN: usize = 32;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name used when a join does not carry one
    #[serde(default)]
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, query.name, state))
}

/// Room ids are short slugs
pub fn valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id.len() <= MAX_ROOM_ID_LEN
        && room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, name: Option<String>, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    // Writer task: everything bound for this client goes through one queue
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(256);
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut session = Session {
        player_id,
        name,
        state,
        out_tx,
        room: None,
    };
    let rate_limiter = PlayerRateLimiter::new();

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => session.dispatch(client_msg).await,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        session
                            .reply(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the room
    session.leave().await;
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

struct JoinedRoom {
    handle: RoomHandle,
    forwarder: JoinHandle<()>,
}

/// Per-connection state: which room the socket is in
struct Session {
    player_id: Uuid,
    name: Option<String>,
    state: AppState,
    out_tx: mpsc::Sender<ServerMsg>,
    room: Option<JoinedRoom>,
}

impl Session {
    async fn dispatch(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::RoomJoin { room_id, name } => self.join(room_id, name).await,
            ClientMsg::RoomLeave { room_id } => {
                if self.room.as_ref().is_some_and(|r| r.handle.id == room_id) {
                    self.leave().await;
                }
            }
            msg => {
                let Some(room) = &self.room else {
                    self.error("not_in_room", "Join a room first").await;
                    return;
                };
                let sent = room.handle.input_tx.send(self.input(msg)).await;
                if sent.is_err() {
                    debug!(player_id = %self.player_id, "Room input channel closed");
                    self.drop_room();
                    self.error("room_closed", "Room has closed").await;
                }
            }
        }
    }

    async fn join(&mut self, room_id: String, name: Option<String>) {
        if !valid_room_id(&room_id) {
            self.error("invalid_room", "Room ids are 1-32 letters, digits, '-' or '_'")
                .await;
            return;
        }
        if self.room.as_ref().is_some_and(|r| r.handle.id != room_id) {
            self.leave().await;
        }

        let handle = match &self.room {
            Some(room) => room.handle.clone(),
            None => {
                let handle = self.state.rooms.get_or_create(&room_id);
                // Subscribe before joining so the first roster update is not missed
                let forwarder = spawn_forwarder(self.player_id, handle.subscribe(), self.out_tx.clone());
                self.room = Some(JoinedRoom {
                    handle: handle.clone(),
                    forwarder,
                });
                handle
            }
        };

        let msg = ClientMsg::RoomJoin {
            room_id,
            name: name.or_else(|| self.name.clone()),
        };
        if handle.input_tx.send(self.input(msg)).await.is_err() {
            self.drop_room();
            self.error("room_closed", "Room has closed, try again").await;
        }
    }

    async fn leave(&mut self) {
        let Some(room) = self.room.take() else {
            return;
        };
        let msg = ClientMsg::RoomLeave {
            room_id: room.handle.id.clone(),
        };
        let _ = room.handle.input_tx.send(self.input(msg)).await;
        room.forwarder.abort();
    }

    fn drop_room(&mut self) {
        if let Some(room) = self.room.take() {
            room.forwarder.abort();
        }
    }

    fn input(&self, msg: ClientMsg) -> PlayerInput {
        PlayerInput {
            player_id: self.player_id,
            msg,
            received_at: unix_millis(),
        }
    }

    async fn error(&self, code: &str, message: &str) {
        self.reply(ServerMsg::Error {
            code: code.to_string(),
            message: message.to_string(),
        })
        .await;
    }

    async fn reply(&self, msg: ServerMsg) {
        let _ = self.out_tx.send(msg).await;
    }
}

/// Forward a room's broadcast to one client, dropping messages meant for others
fn spawn_forwarder(
    player_id: Uuid,
    mut room_rx: broadcast::Receiver<crate::game::Outbound>,
    out_tx: mpsc::Sender<ServerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match room_rx.recv().await {
                Ok(outbound) => {
                    if !outbound.is_for(&player_id) {
                        continue;
                    }
                    if out_tx.send(outbound.msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %player_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Room channel closed");
                    break;
                }
            }
        }
    })
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
