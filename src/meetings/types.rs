//! Meeting DTOs and request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::Pagination;
use crate::users::types::UserSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Populated meeting view, including the attendee roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDto {
    pub id: Uuid,
    pub title: String,
    pub agenda: Option<String>,
    pub status: MeetingStatus,
    pub scheduled_by: UserSummary,
    pub assigned_to: UserSummary,
    pub project_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub attendees: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeetingDto {
    /// Scheduler, primary attendee, or roster member.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.scheduled_by.id == user_id
            || self.assigned_to.id == user_id
            || self.attendees.iter().any(|a| a.id == user_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMeetingRequest {
    pub title: String,
    pub agenda: Option<String>,
    pub assigned_to: Uuid,
    pub project_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeetingStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AddAttendeeRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingListResponse {
    pub meetings: Vec<MeetingDto>,
    pub pagination: Pagination,
}
