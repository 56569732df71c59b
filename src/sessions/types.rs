//! Code-session DTOs and request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::Pagination;
use crate::users::types::UserSummary;

pub const MIN_PARTICIPANTS: i32 = 2;
pub const MAX_PARTICIPANTS: i32 = 10;
pub const DEFAULT_MAX_PARTICIPANTS: i32 = 5;

/// A session participant with presence metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParticipant {
    pub user: UserSummary,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub cursor_position: i32,
}

/// Populated session view. `invite_code` is redacted for everyone but
/// the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSessionDto {
    pub id: Uuid,
    pub owner: UserSummary,
    pub title: String,
    pub language: String,
    pub code: String,
    pub is_public: bool,
    pub is_active: bool,
    pub max_participants: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub participants: Vec<SessionParticipant>,
    pub invited_users: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeSessionDto {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user.id == user_id)
    }

    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_public
            || self.owner.id == user_id
            || self.is_participant(user_id)
            || self.invited_users.contains(&user_id)
    }
}

/// Compact listing entry for the public session browser (no code blob).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub owner: UserSummary,
    pub title: String,
    pub language: String,
    pub participant_count: i64,
    pub max_participants: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    pub language: Option<String>,
    pub max_participants: Option<i32>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub pagination: Pagination,
}
