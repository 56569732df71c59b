//! Server setup: configuration, shared state, and app assembly.

pub mod config;
pub mod init;
pub mod state;

pub use init::{app_with_state, create_app};
pub use state::AppState;
