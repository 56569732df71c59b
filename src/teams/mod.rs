//! Teams: same membership contract as projects, one level up.

pub mod db;
pub mod handlers;
pub mod types;
