//! Database operations for chats, messages, and read receipts.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::chats::types::{ChatDto, ChatType, MessageDto, MessagePreview, ReadReceipt};
use crate::users::types::UserSummary;

/// Redacted content stored in place of a soft-deleted message body.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Normalized key identifying the one direct chat between two users.
pub fn direct_key(a: Uuid, b: Uuid) -> String {
    if a < b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

pub async fn is_participant(pool: &PgPool, chat_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM chat_participants WHERE chat_id = $1 AND user_id = $2",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

pub async fn participant_ids(pool: &PgPool, chat_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id FROM chat_participants WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|r| r.get("user_id")).collect())
}

/// The existing direct chat between two users, if any.
pub async fn find_direct_chat(pool: &PgPool, a: Uuid, b: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM chats WHERE direct_key = $1")
        .bind(direct_key(a, b))
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("id")))
}

/// Create a chat with its participant set.
pub async fn create_chat(
    pool: &PgPool,
    chat_type: ChatType,
    name: Option<&str>,
    created_by: Uuid,
    participants: &[Uuid],
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let key = match chat_type {
        ChatType::Direct => Some(direct_key(participants[0], participants[1])),
        ChatType::Group => None,
    };

    sqlx::query(
        r#"
        INSERT INTO chats (id, chat_type, name, direct_key, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(id)
    .bind(chat_type.as_str())
    .bind(name)
    .bind(key)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    for &user_id in participants {
        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (chat_id, user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(id)
}

async fn participants(pool: &PgPool, chat_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url
        FROM chat_participants cp
        INNER JOIN users u ON u.id = cp.user_id
        WHERE cp.chat_id = $1
        ORDER BY cp.joined_at ASC
        "#,
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
}

/// Messages the viewer has not read and did not send.
pub async fn unread_count(pool: &PgPool, chat_id: Uuid, viewer: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count
        FROM messages m
        WHERE m.chat_id = $1
          AND m.sender_id <> $2
          AND NOT EXISTS (SELECT 1 FROM message_reads mr
                          WHERE mr.message_id = m.id AND mr.user_id = $2)
        "#,
    )
    .bind(chat_id)
    .bind(viewer)
    .fetch_one(pool)
    .await?;

    Ok(row.get("count"))
}

/// One chat shaped for a specific viewer (unread count is viewer-relative).
pub async fn get_chat_for_user(
    pool: &PgPool,
    chat_id: Uuid,
    viewer: Uuid,
) -> Result<Option<ChatDto>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, chat_type, name, created_by, created_at, updated_at FROM chats WHERE id = $1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let last = sqlx::query(
        r#"
        SELECT id, sender_id, content, created_at
        FROM messages
        WHERE chat_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?
    .map(|r| MessagePreview {
        id: r.get("id"),
        sender_id: r.get("sender_id"),
        content: r.get("content"),
        created_at: r.get("created_at"),
    });

    Ok(Some(ChatDto {
        id: row.get("id"),
        chat_type: ChatType::from_str(row.get::<String, _>("chat_type").as_str())
            .unwrap_or(ChatType::Group),
        name: row.get("name"),
        created_by: row.get("created_by"),
        participants: participants(pool, chat_id).await?,
        last_message: last,
        unread_count: unread_count(pool, chat_id, viewer).await?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Every chat the user participates in, most recently active first.
pub async fn list_chats_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ChatDto>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c.id
        FROM chats c
        INNER JOIN chat_participants cp ON cp.chat_id = c.id
        WHERE cp.user_id = $1
        ORDER BY c.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut chats = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        if let Some(chat) = get_chat_for_user(pool, id, user_id).await? {
            chats.push(chat);
        }
    }
    Ok(chats)
}

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.chat_id, m.content, m.is_deleted, m.is_edited, m.edited_at, m.created_at,
           u.id AS sender_id, u.username AS sender_username,
           u.display_name AS sender_display_name, u.avatar_url AS sender_avatar_url
    FROM messages m
    INNER JOIN users u ON u.id = m.sender_id
"#;

async fn read_receipts(pool: &PgPool, message_id: Uuid) -> Result<Vec<ReadReceipt>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id, read_at FROM message_reads WHERE message_id = $1")
        .bind(message_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|r| ReadReceipt {
            user_id: r.get("user_id"),
            read_at: r.get("read_at"),
        })
        .collect())
}

fn message_from_row(row: &sqlx::postgres::PgRow, read_by: Vec<ReadReceipt>) -> MessageDto {
    MessageDto {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        sender: UserSummary {
            id: row.get("sender_id"),
            username: row.get("sender_username"),
            display_name: row.get("sender_display_name"),
            avatar_url: row.get("sender_avatar_url"),
        },
        content: row.get("content"),
        is_deleted: row.get("is_deleted"),
        is_edited: row.get("is_edited"),
        edited_at: row.get("edited_at"),
        read_by,
        created_at: row.get("created_at"),
    }
}

/// Store a message and bump the chat's activity timestamp.
pub async fn insert_message(
    pool: &PgPool,
    chat_id: Uuid,
    sender_id: Uuid,
    content: &str,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO messages (id, chat_id, sender_id, content, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(chat_id)
    .bind(sender_id)
    .bind(content)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE chats SET updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(chat_id)
        .execute(pool)
        .await?;

    Ok(id)
}

pub async fn get_message(pool: &PgPool, message_id: Uuid) -> Result<Option<MessageDto>, sqlx::Error> {
    let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.id = $1"))
        .bind(message_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let read_by = read_receipts(pool, message_id).await?;
            Ok(Some(message_from_row(&row, read_by)))
        }
        None => Ok(None),
    }
}

/// Page of messages, newest first.
pub async fn list_messages(
    pool: &PgPool,
    chat_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MessageDto>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{MESSAGE_SELECT} WHERE m.chat_id = $1 ORDER BY m.created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(chat_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: Uuid = row.get("id");
        let read_by = read_receipts(pool, id).await?;
        messages.push(message_from_row(row, read_by));
    }
    Ok(messages)
}

pub async fn count_messages(pool: &PgPool, chat_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM messages WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

/// Sender and chat of a message, for the authorization gate.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MessageMeta {
    pub sender_id: Uuid,
    pub chat_id: Uuid,
    pub is_deleted: bool,
}

pub async fn get_message_meta(
    pool: &PgPool,
    message_id: Uuid,
) -> Result<Option<MessageMeta>, sqlx::Error> {
    sqlx::query_as::<_, MessageMeta>(
        "SELECT sender_id, chat_id, is_deleted FROM messages WHERE id = $1",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await
}

pub async fn edit_message(pool: &PgPool, message_id: Uuid, content: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET content = $1, is_edited = TRUE, edited_at = $2
        WHERE id = $3
        "#,
    )
    .bind(content)
    .bind(Utc::now())
    .bind(message_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Soft delete: the row survives with redacted content.
pub async fn soft_delete_message(pool: &PgPool, message_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET content = $1, is_deleted = TRUE
        WHERE id = $2
        "#,
    )
    .bind(DELETED_PLACEHOLDER)
    .bind(message_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record read receipts for every unread message in the chat. The
/// participant check is part of the query; a non-participant caller
/// marks nothing.
pub async fn mark_chat_read(pool: &PgPool, chat_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO message_reads (message_id, user_id, read_at)
        SELECT m.id, $2, $3
        FROM messages m
        WHERE m.chat_id = $1
          AND m.sender_id <> $2
          AND EXISTS (SELECT 1 FROM chat_participants cp
                      WHERE cp.chat_id = $1 AND cp.user_id = $2)
        ON CONFLICT (message_id, user_id) DO NOTHING
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_key(a, b), direct_key(b, a));
    }
}
