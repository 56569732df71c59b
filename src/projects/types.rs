//! Project DTOs, membership roles, and request types.
//!
//! `MemberRole` is shared with teams; both carry the same
//! owner/admin/member contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::types::UserSummary;

/// Membership role. The creator is always an implicit owner member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Owner and admin may manage membership and edit the entity.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// A populated membership entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user: UserSummary,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_by: UserSummary,
    pub team_id: Option<Uuid>,
    pub members: Vec<Member>,
    pub task_count: i64,
    pub meeting_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [MemberRole::Owner, MemberRole::Admin, MemberRole::Member] {
            assert_eq!(MemberRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(MemberRole::from_str("superuser"), None);
    }

    #[test]
    fn test_manage_rights() {
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Admin.can_manage());
        assert!(!MemberRole::Member.can_manage());
    }
}
