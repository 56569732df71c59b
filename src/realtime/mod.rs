//! Real-time layer
//!
//! Room-based event fan-out over one WebSocket endpoint. Rooms are keyed
//! `chat:<id>`, `session:<id>`, and `user:<id>`; emission is fire-and-forget
//! with no delivery queue. A realtime failure never fails an HTTP request.

pub mod events;
pub mod hub;
pub mod socket;

pub use events::{ClientEvent, ServerEvent};
pub use hub::RealtimeHub;
pub use socket::ws_handler;
