/**
 * WebSocket Connection Handling
 *
 * One endpoint (`GET /ws?token=<jwt>`) carries every real-time surface:
 * chat rooms, code-session rooms, and the personal notification room.
 *
 * # Connection lifecycle
 *
 * 1. The handshake must present a verifiable bearer token; the user row is
 *    re-checked against the database before the upgrade completes.
 * 2. On success the socket is bound to exactly one user id, auto-joined to
 *    the personal room `user:<id>`, sent a `connected` event, and a global
 *    `user_online` is broadcast.
 * 3. Room membership changes via `join_chat`/`join_session` messages; each
 *    joined room runs a forwarder task that copies room events onto the
 *    socket, skipping events this connection originated.
 * 4. On disconnect every forwarder is aborted, presence is cleared if this
 *    socket is still the tracked one, and `user_offline` is broadcast.
 *
 * Relay events (`code_change`, `cursor_move`, typing) are rebroadcast to
 * the room without persistence; the authoritative code blob is only
 * written by the explicit HTTP save endpoint.
 */

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::sessions::verify_token;
use crate::auth::users;
use crate::error::ApiError;
use crate::realtime::events::{ClientEvent, ServerEvent, ServerEventKind};
use crate::realtime::hub::{chat_room, session_room, user_room, RealtimeHub};
use crate::server::state::AppState;
use crate::{chats, sessions};

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_token(&params.token)
        .map_err(|_| ApiError::unauthorized("Invalid or missing token"))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;

    // The token may outlive the account; re-resolve the user per handshake.
    users::get_user_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Forward one room's events onto this connection's outbound queue.
fn spawn_room_forwarder(
    hub: &RealtimeHub,
    room: &str,
    tx: mpsc::Sender<ServerEvent>,
    conn_id: u64,
) -> JoinHandle<()> {
    let mut room_rx = hub.subscribe(room);
    tokio::spawn(async move {
        loop {
            match room_rx.recv().await {
                Ok(event) => {
                    if event.origin == Some(conn_id) {
                        continue;
                    }
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                // dropped events are acceptable; delivery is best-effort
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "room forwarder lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let hub = state.realtime.clone();
    let conn_id = hub.register_connection(user_id);
    tracing::info!(%user_id, conn_id, "websocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(64);

    // Outbound pump: serialize queued events onto the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("failed to serialize event: {:?}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Personal room and global presence are joined for the whole life of
    // the connection.
    let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();
    forwarders.insert(
        user_room(user_id),
        spawn_room_forwarder(&hub, &user_room(user_id), tx.clone(), conn_id),
    );
    let global_forwarder = {
        let mut global_rx = hub.subscribe_global();
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match global_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    let _ = tx.send(ServerEvent::connected(user_id)).await;
    hub.emit_global(ServerEvent::user_online(user_id));

    // Inbound loop: parse and dispatch client events until the socket
    // closes or the outbound pump dies.
    let state_for_recv = state.clone();
    let tx_for_recv = tx.clone();
    let hub_for_recv = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let event = match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(%user_id, "unparseable client event: {:?}", e);
                    continue;
                }
            };
            handle_client_event(
                &state_for_recv,
                &hub_for_recv,
                &mut forwarders,
                &tx_for_recv,
                user_id,
                conn_id,
                event,
            )
            .await;
        }
        forwarders
    });

    // Whichever side ends first tears the connection down.
    let forwarders = tokio::select! {
        joined = (&mut recv_task) => {
            send_task.abort();
            joined.unwrap_or_default()
        }
        _ = (&mut send_task) => {
            recv_task.abort();
            HashMap::new()
        }
    };

    for (_, handle) in forwarders {
        handle.abort();
    }
    global_forwarder.abort();

    if hub.unregister_connection(user_id, conn_id) {
        hub.emit_global(ServerEvent::user_offline(user_id));
    }
    tracing::info!(%user_id, conn_id, "websocket disconnected");
}

/// Dispatch a single client event.
async fn handle_client_event(
    state: &AppState,
    hub: &RealtimeHub,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
    tx: &mpsc::Sender<ServerEvent>,
    user_id: Uuid,
    conn_id: u64,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinChat { chat_id } => {
            match chats::db::is_participant(&state.pool, chat_id, user_id).await {
                Ok(true) => {
                    let room = chat_room(chat_id);
                    forwarders
                        .entry(room.clone())
                        .or_insert_with(|| spawn_room_forwarder(hub, &room, tx.clone(), conn_id));
                }
                Ok(false) => {
                    tracing::debug!(%user_id, %chat_id, "join_chat rejected: not a participant");
                }
                Err(e) => tracing::warn!("join_chat lookup failed: {:?}", e),
            }
        }
        ClientEvent::LeaveChat { chat_id } => {
            if let Some(handle) = forwarders.remove(&chat_room(chat_id)) {
                handle.abort();
            }
        }
        ClientEvent::TypingStart { chat_id } | ClientEvent::TypingStop { chat_id } => {
            let room = chat_room(chat_id);
            if forwarders.contains_key(&room) {
                let is_typing = matches!(event, ClientEvent::TypingStart { .. });
                hub.emit_to_room(
                    &room,
                    ServerEvent::relayed(
                        ServerEventKind::UserTyping,
                        serde_json::json!({
                            "chat_id": chat_id,
                            "user_id": user_id,
                            "is_typing": is_typing,
                        }),
                        conn_id,
                    ),
                );
            }
        }
        ClientEvent::MarkAsRead { chat_id } => {
            match chats::db::mark_chat_read(&state.pool, chat_id, user_id).await {
                Ok(_) => hub.emit_to_room(&chat_room(chat_id), ServerEvent::message_read(chat_id, user_id)),
                Err(e) => tracing::warn!("mark_as_read failed: {:?}", e),
            }
        }
        ClientEvent::JoinSession { session_id } => {
            match sessions::db::is_session_participant(&state.pool, session_id, user_id).await {
                Ok(true) => {
                    let room = session_room(session_id);
                    forwarders
                        .entry(room.clone())
                        .or_insert_with(|| spawn_room_forwarder(hub, &room, tx.clone(), conn_id));
                    hub.emit_to_room(
                        &room,
                        ServerEvent::relayed(
                            ServerEventKind::UserJoinedSession,
                            serde_json::json!({ "session_id": session_id, "user_id": user_id }),
                            conn_id,
                        ),
                    );
                }
                Ok(false) => {
                    tracing::debug!(%user_id, %session_id, "join_session rejected: not a participant");
                }
                Err(e) => tracing::warn!("join_session lookup failed: {:?}", e),
            }
        }
        ClientEvent::LeaveSession { session_id } => {
            let room = session_room(session_id);
            if let Some(handle) = forwarders.remove(&room) {
                handle.abort();
                hub.emit_to_room(
                    &room,
                    ServerEvent::relayed(
                        ServerEventKind::UserLeftSession,
                        serde_json::json!({ "session_id": session_id, "user_id": user_id }),
                        conn_id,
                    ),
                );
            }
        }
        ClientEvent::CodeChange { session_id, code } => {
            // Relayed verbatim; the blob is only persisted by the explicit
            // save endpoint.
            let room = session_room(session_id);
            if forwarders.contains_key(&room) {
                hub.emit_to_room(
                    &room,
                    ServerEvent::relayed(
                        ServerEventKind::CodeUpdated,
                        serde_json::json!({
                            "session_id": session_id,
                            "user_id": user_id,
                            "code": code,
                            "persisted": false,
                        }),
                        conn_id,
                    ),
                );
            }
        }
        ClientEvent::CursorMove { session_id, position } => {
            let room = session_room(session_id);
            if forwarders.contains_key(&room) {
                if let Err(e) =
                    sessions::db::update_cursor(&state.pool, session_id, user_id, position).await
                {
                    tracing::debug!("cursor position update failed: {:?}", e);
                }
                hub.emit_to_room(
                    &room,
                    ServerEvent::relayed(
                        ServerEventKind::CursorUpdated,
                        serde_json::json!({
                            "session_id": session_id,
                            "user_id": user_id,
                            "position": position,
                        }),
                        conn_id,
                    ),
                );
            }
        }
        ClientEvent::UserTypingSession { session_id, is_typing } => {
            let room = session_room(session_id);
            if forwarders.contains_key(&room) {
                hub.emit_to_room(
                    &room,
                    ServerEvent::relayed(
                        ServerEventKind::UserTypingSession,
                        serde_json::json!({
                            "session_id": session_id,
                            "user_id": user_id,
                            "is_typing": is_typing,
                        }),
                        conn_id,
                    ),
                );
            }
        }
    }
}
