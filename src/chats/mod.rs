//! Chat and message handling: direct/group chats, soft-deleted and edited
//! messages, read receipts, and room-scoped realtime fan-out.

pub mod db;
pub mod handlers;
pub mod types;
