/**
 * Real-time Event Types
 *
 * Wire types for the WebSocket channel. Server events share one shape:
 *
 * ```json
 * { "event": "new_message", "payload": { ... }, "timestamp": "..." }
 * ```
 *
 * Client events are tagged the same way and carry the room id they act on.
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Every event name the server can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerEventKind {
    Connected,
    UserOnline,
    UserOffline,
    NewMessage,
    MessageUpdated,
    MessageDeleted,
    ChatUpdated,
    UserTyping,
    MessageRead,
    UserJoinedSession,
    UserLeftSession,
    CodeUpdated,
    CursorUpdated,
    UserTypingSession,
    SessionEnded,
}

/// A single event broadcast to a room or connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: ServerEventKind,
    pub payload: Value,
    pub timestamp: chrono::DateTime<Utc>,
    /// Connection that originated a relayed event; used so verbatim relays
    /// (code_change, cursor_move) skip the sender. Never serialized.
    #[serde(skip)]
    pub origin: Option<u64>,
}

impl ServerEvent {
    pub fn new(event: ServerEventKind, payload: Value) -> Self {
        Self {
            event,
            payload,
            timestamp: Utc::now(),
            origin: None,
        }
    }

    /// A relayed client event; carries the originating connection so the
    /// sender's own socket does not echo it back.
    pub fn relayed(event: ServerEventKind, payload: Value, origin: u64) -> Self {
        Self {
            event,
            payload,
            timestamp: Utc::now(),
            origin: Some(origin),
        }
    }

    pub fn connected(user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::Connected,
            serde_json::json!({ "user_id": user_id }),
        )
    }

    pub fn user_online(user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::UserOnline,
            serde_json::json!({ "user_id": user_id }),
        )
    }

    pub fn user_offline(user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::UserOffline,
            serde_json::json!({ "user_id": user_id }),
        )
    }

    pub fn user_typing(chat_id: Uuid, user_id: Uuid, is_typing: bool) -> Self {
        Self::new(
            ServerEventKind::UserTyping,
            serde_json::json!({
                "chat_id": chat_id,
                "user_id": user_id,
                "is_typing": is_typing,
            }),
        )
    }

    pub fn message_read(chat_id: Uuid, user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::MessageRead,
            serde_json::json!({ "chat_id": chat_id, "user_id": user_id }),
        )
    }

    pub fn user_joined_session(session_id: Uuid, user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::UserJoinedSession,
            serde_json::json!({ "session_id": session_id, "user_id": user_id }),
        )
    }

    pub fn user_left_session(session_id: Uuid, user_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::UserLeftSession,
            serde_json::json!({ "session_id": session_id, "user_id": user_id }),
        )
    }

    pub fn session_ended(session_id: Uuid) -> Self {
        Self::new(
            ServerEventKind::SessionEnded,
            serde_json::json!({ "session_id": session_id }),
        )
    }
}

/// Client-to-server events received over the socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat { chat_id: Uuid },
    LeaveChat { chat_id: Uuid },
    TypingStart { chat_id: Uuid },
    TypingStop { chat_id: Uuid },
    MarkAsRead { chat_id: Uuid },
    JoinSession { session_id: Uuid },
    LeaveSession { session_id: Uuid },
    CodeChange { session_id: Uuid, code: String },
    CursorMove { session_id: Uuid, position: i32 },
    UserTypingSession { session_id: Uuid, is_typing: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::user_online(Uuid::nil());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "user_online");
        assert_eq!(value["payload"]["user_id"], Uuid::nil().to_string());
        // origin is connection-local, never on the wire
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn test_client_event_parsing() {
        let raw = r#"{"event":"join_chat","chat_id":"00000000-0000-0000-0000-000000000000"}"#;
        let parsed: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, ClientEvent::JoinChat { chat_id: Uuid::nil() });
    }

    #[test]
    fn test_client_code_change_parsing() {
        let raw = format!(
            r#"{{"event":"code_change","session_id":"{}","code":"fn main() {{}}"}}"#,
            Uuid::nil()
        );
        let parsed: ClientEvent = serde_json::from_str(&raw).unwrap();
        match parsed {
            ClientEvent::CodeChange { session_id, code } => {
                assert_eq!(session_id, Uuid::nil());
                assert_eq!(code, "fn main() {}");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_client_event_rejected() {
        let raw = r#"{"event":"drop_tables"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }
}
