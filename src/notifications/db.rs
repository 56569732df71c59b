//! Database operations for notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// A notification row, shaped for the API.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert a notification. Callers treat failures as non-fatal side
/// effects and only log them.
pub async fn create_notification(
    pool: &PgPool,
    recipient: Uuid,
    sender: Option<Uuid>,
    kind: &str,
    message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, recipient_id, sender_id, kind, message, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, FALSE, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(recipient)
    .bind(sender)
    .bind(kind)
    .bind(message)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// The caller's notifications, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    recipient: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, recipient_id, sender_id, kind, message, is_read, created_at
        FROM notifications
        WHERE recipient_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(recipient)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_for_user(pool: &PgPool, recipient: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM notifications WHERE recipient_id = $1")
        .bind(recipient)
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

pub async fn count_unread(pool: &PgPool, recipient: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(recipient)
    .fetch_one(pool)
    .await?;
    Ok(row.get("count"))
}

/// Mark one notification read. The recipient filter makes the operation
/// recipient-only at the query level; returns false when nothing matched.
pub async fn mark_read(
    pool: &PgPool,
    notification_id: Uuid,
    recipient: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
    )
    .bind(notification_id)
    .bind(recipient)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark every unread notification of the caller read. Returns how many
/// rows flipped; rows belonging to other users are untouched.
pub async fn mark_all_read(pool: &PgPool, recipient: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(recipient)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
