//! Database operations for friend requests and friendships.
//!
//! Friendships are symmetric and stored once with `user_a < user_b`; the
//! unique index on the normalized pair makes duplicate acceptance a
//! conflict instead of a second row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::users::types::UserSummary;

/// Lifecycle of a friend request: pending -> accepted | rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A friend request with the sender populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user: UserSummary,
    pub to_user_id: Uuid,
    pub message: Option<String>,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

fn request_from_row(row: &sqlx::postgres::PgRow) -> FriendRequest {
    FriendRequest {
        id: row.get("id"),
        from_user: UserSummary {
            id: row.get("from_user_id"),
            username: row.get("from_username"),
            display_name: row.get("from_display_name"),
            avatar_url: row.get("from_avatar_url"),
        },
        to_user_id: row.get("to_user_id"),
        message: row.get("message"),
        status: FriendRequestStatus::from_str(row.get::<String, _>("status").as_str())
            .unwrap_or(FriendRequestStatus::Pending),
        created_at: row.get("created_at"),
        responded_at: row.get("responded_at"),
    }
}

const REQUEST_SELECT: &str = r#"
    SELECT r.id, r.from_user_id, r.to_user_id, r.message, r.status,
           r.created_at, r.responded_at,
           u.username AS from_username,
           u.display_name AS from_display_name,
           u.avatar_url AS from_avatar_url
    FROM friend_requests r
    INNER JOIN users u ON u.id = r.from_user_id
"#;

/// Create a pending friend request.
pub async fn create_request(
    pool: &PgPool,
    from_user: Uuid,
    to_user: Uuid,
    message: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO friend_requests (id, from_user_id, to_user_id, message, status, created_at)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        "#,
    )
    .bind(id)
    .bind(from_user)
    .bind(to_user)
    .bind(message)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Pending requests addressed to a user, sender populated.
pub async fn pending_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<FriendRequest>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{REQUEST_SELECT} WHERE r.to_user_id = $1 AND r.status = 'pending' ORDER BY r.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(request_from_row).collect())
}

/// One request by id.
pub async fn get_request(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<Option<FriendRequest>, sqlx::Error> {
    let row = sqlx::query(&format!("{REQUEST_SELECT} WHERE r.id = $1"))
        .bind(request_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(request_from_row))
}

/// Is there a pending request in either direction between two users?
pub async fn has_pending_between(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count FROM friend_requests
        WHERE status = 'pending'
          AND ((from_user_id = $1 AND to_user_id = $2)
            OR (from_user_id = $2 AND to_user_id = $1))
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

/// Transition a request out of pending.
pub async fn set_request_status(
    pool: &PgPool,
    request_id: Uuid,
    status: FriendRequestStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE friend_requests SET status = $1, responded_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(request_id)
        .execute(pool)
        .await?;

    Ok(())
}

fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Create the symmetric friendship row.
pub async fn create_friendship(pool: &PgPool, a: Uuid, b: Uuid) -> Result<(), sqlx::Error> {
    let (user_a, user_b) = normalize_pair(a, b);
    sqlx::query(
        r#"
        INSERT INTO friendships (id, user_a, user_b, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_a, user_b) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_a)
    .bind(user_b)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn are_friends(pool: &PgPool, a: Uuid, b: Uuid) -> Result<bool, sqlx::Error> {
    let (user_a, user_b) = normalize_pair(a, b);
    let row = sqlx::query("SELECT COUNT(*) AS count FROM friendships WHERE user_a = $1 AND user_b = $2")
        .bind(user_a)
        .bind(user_b)
        .fetch_one(pool)
        .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

/// Remove a friendship. Returns false when none existed.
pub async fn delete_friendship(pool: &PgPool, a: Uuid, b: Uuid) -> Result<bool, sqlx::Error> {
    let (user_a, user_b) = normalize_pair(a, b);
    let result = sqlx::query("DELETE FROM friendships WHERE user_a = $1 AND user_b = $2")
        .bind(user_a)
        .bind(user_b)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All friends of a user, populated.
pub async fn list_friends(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url
        FROM friendships f
        INNER JOIN users u
            ON u.id = CASE WHEN f.user_a = $1 THEN f.user_b ELSE f.user_a END
        WHERE f.user_a = $1 OR f.user_b = $1
        ORDER BY u.username ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
        let (lo, hi) = normalize_pair(a, b);
        assert!(lo < hi);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            FriendRequestStatus::Pending,
            FriendRequestStatus::Accepted,
            FriendRequestStatus::Rejected,
        ] {
            assert_eq!(FriendRequestStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(FriendRequestStatus::from_str("bogus"), None);
    }
}
