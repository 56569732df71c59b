//! Authentication: JWT sessions, user credentials, and the auth handlers.

pub mod handlers;
pub mod sessions;
pub mod users;

pub use handlers::{get_me, login, signup};
