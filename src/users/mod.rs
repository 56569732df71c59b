//! User profiles, search, and the follow graph.

pub mod db;
pub mod handlers;
pub mod types;
