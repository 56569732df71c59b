//! Crewspace - Collaboration Platform Backend
//!
//! Crewspace is a multi-tenant collaboration backend: user profiles and the
//! social graph, teams, projects, tasks, meetings, real-time chat, and live
//! code-collaboration sessions, exposed over a JSON REST API plus a single
//! WebSocket channel for presence, typing, and live-editing events.
//!
//! # Architecture
//!
//! The library is organized into a thin layer of plumbing modules and one
//! module per domain resource:
//!
//! - **`server`** - Application state, configuration, and app assembly
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`middleware`** - Bearer-token authentication middleware
//! - **`auth`** - JWT sessions, credentials, signup/login handlers
//! - **`cache`** - Best-effort Redis read-through cache with TTL discipline
//! - **`realtime`** - Room-based WebSocket event fan-out and presence
//! - **`error`** - The request error taxonomy and HTTP conversion
//! - **`email`** - Optional fire-and-forget SMTP notifications
//!
//! Domain modules (`users`, `friends`, `tasks`, `meetings`, `projects`,
//! `teams`, `chats`, `sessions`, `notifications`) each split persistence
//! queries (`db.rs`) from HTTP handlers (`handlers.rs`).
//!
//! # Request Flow
//!
//! HTTP request -> auth middleware attaches the caller -> handler validates
//! the body -> persistence write -> cache write-through + pattern
//! invalidation -> optional room broadcast -> JSON envelope response.
//!
//! Cache and realtime failures are logged and swallowed; they never fail the
//! request. Persistence failures are terminal for the request.

pub mod auth;
pub mod cache;
pub mod chats;
pub mod email;
pub mod error;
pub mod friends;
pub mod meetings;
pub mod middleware;
pub mod notifications;
pub mod projects;
pub mod realtime;
pub mod response;
pub mod routes;
pub mod server;
pub mod sessions;
pub mod tasks;
pub mod teams;
pub mod users;

pub use error::ApiError;
pub use server::state::AppState;
