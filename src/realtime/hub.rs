/**
 * Real-time Fan-out Hub
 *
 * Per-room `tokio::sync::broadcast` channels plus a global channel for
 * presence events. Rooms are created lazily on first use and reaped by a
 * periodic cleanup when they have no subscribers left.
 *
 * # Presence
 *
 * Presence maps a user id to the sequence number of their most recent
 * connection. Multiple simultaneous connections per user are not
 * deduplicated: only the most recent socket is tracked, so presence means
 * "last connected socket", not "any connected socket".
 *
 * # Delivery semantics
 *
 * Emission is fire-and-forget. If a room has no subscribers the event is
 * silently dropped; there is no queue and no redelivery.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::realtime::events::ServerEvent;

const ROOM_CHANNEL_CAPACITY: usize = 256;
const GLOBAL_CHANNEL_CAPACITY: usize = 1024;

/// Room name for a chat's participants.
pub fn chat_room(chat_id: Uuid) -> String {
    format!("chat:{}", chat_id)
}

/// Room name for a code session's participants.
pub fn session_room(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

/// Personal room a socket is auto-joined to at connect time.
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// The injected event publisher shared by HTTP handlers and the socket
/// layer. Cloning is cheap; all clones share the same rooms.
#[derive(Clone)]
pub struct RealtimeHub {
    rooms: Arc<Mutex<HashMap<String, broadcast::Sender<ServerEvent>>>>,
    global: broadcast::Sender<ServerEvent>,
    presence: Arc<Mutex<HashMap<Uuid, u64>>>,
    conn_seq: Arc<AtomicU64>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(GLOBAL_CHANNEL_CAPACITY);
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            global,
            presence: Arc::new(Mutex::new(HashMap::new())),
            conn_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Get or create the broadcast sender for a room.
    pub fn room_sender(&self, room: &str) -> broadcast::Sender<ServerEvent> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to a room's events.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        self.room_sender(room).subscribe()
    }

    /// Subscribe to global presence events.
    pub fn subscribe_global(&self) -> broadcast::Receiver<ServerEvent> {
        self.global.subscribe()
    }

    /// Emit an event to one room. Fire-and-forget: with no subscribers the
    /// event is dropped.
    pub fn emit_to_room(&self, room: &str, event: ServerEvent) {
        let sender = {
            let rooms = self.rooms.lock().unwrap();
            rooms.get(room).cloned()
        };
        let Some(sender) = sender else {
            tracing::debug!(room, "no room channel, event dropped");
            return;
        };
        match sender.send(event) {
            Ok(count) => tracing::debug!(room, subscribers = count, "event emitted"),
            Err(_) => tracing::debug!(room, "no subscribers, event dropped"),
        }
    }

    /// Emit to every connected socket.
    pub fn emit_global(&self, event: ServerEvent) {
        if self.global.send(event).is_err() {
            tracing::debug!("no global subscribers, event dropped");
        }
    }

    /// Register a new connection for a user. Returns the connection
    /// sequence number; the latest registration wins the presence slot.
    pub fn register_connection(&self, user_id: Uuid) -> u64 {
        let conn_id = self.conn_seq.fetch_add(1, Ordering::Relaxed);
        self.presence.lock().unwrap().insert(user_id, conn_id);
        conn_id
    }

    /// Drop a connection. Presence is cleared only when the closing socket
    /// is still the tracked one; returns whether the user went offline.
    pub fn unregister_connection(&self, user_id: Uuid, conn_id: u64) -> bool {
        let mut presence = self.presence.lock().unwrap();
        if presence.get(&user_id) == Some(&conn_id) {
            presence.remove(&user_id);
            true
        } else {
            false
        }
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.presence.lock().unwrap().contains_key(&user_id)
    }

    /// Drop room channels nobody subscribes to anymore.
    pub fn cleanup_idle_rooms(&self) {
        let mut rooms = self.rooms.lock().unwrap();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of live subscribers in a room.
    pub fn subscriber_count(&self, room: &str) -> usize {
        let rooms = self.rooms.lock().unwrap();
        rooms
            .get(room)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::ServerEventKind;

    #[tokio::test]
    async fn test_room_emit_reaches_subscriber() {
        let hub = RealtimeHub::new();
        let room = chat_room(Uuid::new_v4());
        let mut rx = hub.subscribe(&room);

        hub.emit_to_room(&room, ServerEvent::user_typing(Uuid::nil(), Uuid::nil(), true));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, ServerEventKind::UserTyping);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_dropped() {
        let hub = RealtimeHub::new();
        // never panics, never blocks
        hub.emit_to_room("chat:none", ServerEvent::session_ended(Uuid::nil()));
        hub.emit_global(ServerEvent::user_online(Uuid::nil()));
    }

    #[test]
    fn test_presence_last_socket_wins() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();

        let first = hub.register_connection(user);
        let second = hub.register_connection(user);
        assert!(hub.is_online(user));

        // stale socket closing does not clear presence
        assert!(!hub.unregister_connection(user, first));
        assert!(hub.is_online(user));

        // the tracked socket closing does
        assert!(hub.unregister_connection(user, second));
        assert!(!hub.is_online(user));
    }

    #[tokio::test]
    async fn test_idle_room_cleanup() {
        let hub = RealtimeHub::new();
        let room = session_room(Uuid::new_v4());
        {
            let _rx = hub.subscribe(&room);
            hub.cleanup_idle_rooms();
            assert_eq!(hub.subscriber_count(&room), 1);
        }
        hub.cleanup_idle_rooms();
        assert_eq!(hub.subscriber_count(&room), 0);
    }
}
