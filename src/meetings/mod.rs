//! Meetings: scheduler/attendee ownership, rescheduling, attendee roster.

pub mod db;
pub mod handlers;
pub mod types;
