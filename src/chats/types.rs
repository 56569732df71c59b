//! Chat and message DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::Pagination;
use crate::users::types::UserSummary;

/// Direct chats have exactly two participants; group chats have a name
/// and two or more.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Short preview of the latest message, shown on chat listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A chat as seen by one participant (unread count is caller-relative).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDto {
    pub id: Uuid,
    pub chat_type: ChatType,
    pub name: Option<String>,
    pub created_by: Uuid,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<MessagePreview>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A read receipt on a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// A message with its sender populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub is_deleted: bool,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub chat_type: String,
    /// The OTHER participants; the caller is always included.
    pub participants: Vec<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageDto>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_type_round_trip() {
        assert_eq!(ChatType::from_str("direct"), Some(ChatType::Direct));
        assert_eq!(ChatType::from_str("group"), Some(ChatType::Group));
        assert_eq!(ChatType::from_str("broadcast"), None);
    }
}
