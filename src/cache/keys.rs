//! Cache key builders and TTLs
//!
//! All cache keys are built here so the invalidation fan-out in the
//! handlers and the read paths can never drift apart on naming.
//!
//! Key families:
//! - per-id entity: `task:<id>` (TTL 3600)
//! - per-user list: `user:<id>:<resource>` (TTL 1800)
//! - query/listing: `<resource>:<serialized filters>` (TTL 300), invalidated
//!   by prefix pattern because the key space is unbounded
//! - stats/dashboard: `user:<id>:<resource>:stats` (TTL 900)

use uuid::Uuid;

/// Single entities.
pub const TTL_ENTITY: u64 = 3600;
/// Per-user resource lists.
pub const TTL_USER_LIST: u64 = 1800;
/// Paginated/filtered query results.
pub const TTL_QUERY: u64 = 300;
/// Dashboard and stat aggregates.
pub const TTL_STATS: u64 = 900;

pub fn task(id: Uuid) -> String {
    format!("task:{}", id)
}

pub fn user_tasks(user_id: Uuid) -> String {
    format!("user:{}:tasks", user_id)
}

pub fn user_task_stats(user_id: Uuid) -> String {
    format!("user:{}:tasks:stats", user_id)
}

/// Listing key from the serialized filter set. Unbounded key space;
/// invalidated via `TASKS_QUERY_PATTERN`.
pub fn tasks_query(caller: Uuid, filters: &str) -> String {
    format!("tasks:{}:{}", caller, filters)
}

pub const TASKS_QUERY_PATTERN: &str = "tasks:*";

pub fn meeting(id: Uuid) -> String {
    format!("meeting:{}", id)
}

pub fn user_meetings(user_id: Uuid) -> String {
    format!("user:{}:meetings", user_id)
}

pub fn meetings_query(caller: Uuid, filters: &str) -> String {
    format!("meetings:{}:{}", caller, filters)
}

pub const MEETINGS_QUERY_PATTERN: &str = "meetings:*";

pub fn project(id: Uuid) -> String {
    format!("project:{}", id)
}

pub fn user_projects(user_id: Uuid) -> String {
    format!("user:{}:projects", user_id)
}

pub const PROJECTS_QUERY_PATTERN: &str = "projects:*";

pub fn team(id: Uuid) -> String {
    format!("team:{}", id)
}

pub fn user_teams(user_id: Uuid) -> String {
    format!("user:{}:teams", user_id)
}

pub const TEAMS_QUERY_PATTERN: &str = "teams:*";

pub fn user_chats(user_id: Uuid) -> String {
    format!("user:{}:chats", user_id)
}

/// Message pages for one chat; cleared wholesale on any message mutation.
pub fn chat_messages_pattern(chat_id: Uuid) -> String {
    format!("messages:{}:*", chat_id)
}

pub fn chat_messages_page(chat_id: Uuid, page: u32, limit: u32) -> String {
    format!("messages:{}:{}:{}", chat_id, page, limit)
}

pub fn code_session(id: Uuid) -> String {
    format!("code_session:{}", id)
}

pub const CODE_SESSIONS_QUERY_PATTERN: &str = "code_sessions:*";

pub fn code_sessions_query(filters: &str) -> String {
    format!("code_sessions:{}", filters)
}

pub fn user_notifications(user_id: Uuid) -> String {
    format!("user:{}:notifications", user_id)
}

pub fn user_profile(user_id: Uuid) -> String {
    format!("user:{}:profile", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_families_are_disjoint() {
        let id = Uuid::nil();
        assert_eq!(task(id), format!("task:{}", id));
        assert_eq!(user_tasks(id), format!("user:{}:tasks", id));
        assert_eq!(user_task_stats(id), format!("user:{}:tasks:stats", id));
        assert!(tasks_query(id, "{}").starts_with("tasks:"));
    }

    #[test]
    fn test_query_keys_match_their_pattern() {
        let id = Uuid::new_v4();
        let key = tasks_query(id, r#"{"status":"pending"}"#);
        // the glob prefix must cover every query key
        assert!(key.starts_with(&TASKS_QUERY_PATTERN[..TASKS_QUERY_PATTERN.len() - 1]));
    }

    #[test]
    fn test_message_page_keys_match_chat_pattern() {
        let chat_id = Uuid::new_v4();
        let key = chat_messages_page(chat_id, 2, 50);
        let pattern = chat_messages_pattern(chat_id);
        assert!(key.starts_with(&pattern[..pattern.len() - 1]));
    }
}
