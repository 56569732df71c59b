//! Database operations for code sessions.
//!
//! Membership exclusivity relies on single-statement atomicity only:
//! `add_participant_checked` performs the capacity check and the insert in
//! one statement so two concurrent joins cannot both land past the cap.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sessions::types::{CodeSessionDto, SessionParticipant, SessionSummary};
use crate::users::types::UserSummary;

/// Gate projection for ownership/visibility checks.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionMeta {
    pub owner_id: Uuid,
    pub is_public: bool,
    pub is_active: bool,
    pub max_participants: i32,
}

pub async fn get_meta(pool: &PgPool, id: Uuid) -> Result<Option<SessionMeta>, sqlx::Error> {
    sqlx::query_as::<_, SessionMeta>(
        "SELECT owner_id, is_public, is_active, max_participants FROM code_sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_session(
    pool: &PgPool,
    owner_id: Uuid,
    title: &str,
    language: &str,
    max_participants: i32,
    is_public: bool,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO code_sessions (id, owner_id, title, language, code, is_public,
                                   is_active, max_participants, created_at, updated_at)
        VALUES ($1, $2, $3, $4, '', $5, TRUE, $6, $7, $7)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(title)
    .bind(language)
    .bind(is_public)
    .bind(max_participants)
    .bind(now)
    .execute(pool)
    .await?;

    // the owner is the first participant
    sqlx::query(
        r#"
        INSERT INTO session_participants (session_id, user_id, joined_at, last_active)
        VALUES ($1, $2, $3, $3)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn participants(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<SessionParticipant>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url,
               sp.joined_at, sp.last_active, sp.cursor_position
        FROM session_participants sp
        INNER JOIN users u ON u.id = sp.user_id
        WHERE sp.session_id = $1
        ORDER BY sp.joined_at ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SessionParticipant {
            user: UserSummary {
                id: row.get("id"),
                username: row.get("username"),
                display_name: row.get("display_name"),
                avatar_url: row.get("avatar_url"),
            },
            joined_at: row.get("joined_at"),
            last_active: row.get("last_active"),
            cursor_position: row.get("cursor_position"),
        })
        .collect())
}

pub async fn invited_users(pool: &PgPool, session_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id FROM session_invites WHERE session_id = $1")
        .bind(session_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|r| r.get("user_id")).collect())
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<CodeSessionDto>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT s.id, s.title, s.language, s.code, s.is_public, s.is_active,
               s.max_participants, s.invite_code, s.created_at, s.updated_at,
               u.id AS owner_id, u.username AS owner_username,
               u.display_name AS owner_display_name, u.avatar_url AS owner_avatar_url
        FROM code_sessions s
        INNER JOIN users u ON u.id = s.owner_id
        WHERE s.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(CodeSessionDto {
        id: row.get("id"),
        owner: UserSummary {
            id: row.get("owner_id"),
            username: row.get("owner_username"),
            display_name: row.get("owner_display_name"),
            avatar_url: row.get("owner_avatar_url"),
        },
        title: row.get("title"),
        language: row.get("language"),
        code: row.get("code"),
        is_public: row.get("is_public"),
        is_active: row.get("is_active"),
        max_participants: row.get("max_participants"),
        invite_code: row.get("invite_code"),
        participants: participants(pool, id).await?,
        invited_users: invited_users(pool, id).await?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Public, active sessions for the browser listing.
pub async fn list_public(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<SessionSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.title, s.language, s.max_participants, s.created_at,
               u.id AS owner_id, u.username AS owner_username,
               u.display_name AS owner_display_name, u.avatar_url AS owner_avatar_url,
               (SELECT COUNT(*) FROM session_participants sp
                WHERE sp.session_id = s.id) AS participant_count
        FROM code_sessions s
        INNER JOIN users u ON u.id = s.owner_id
        WHERE s.is_public = TRUE AND s.is_active = TRUE
        ORDER BY s.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SessionSummary {
            id: row.get("id"),
            owner: UserSummary {
                id: row.get("owner_id"),
                username: row.get("owner_username"),
                display_name: row.get("owner_display_name"),
                avatar_url: row.get("owner_avatar_url"),
            },
            title: row.get("title"),
            language: row.get("language"),
            participant_count: row.get("participant_count"),
            max_participants: row.get("max_participants"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn count_public(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM code_sessions WHERE is_public = TRUE AND is_active = TRUE",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.get("count"))
}

pub async fn is_session_participant(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM session_participants WHERE session_id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

pub async fn is_invited(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM session_invites WHERE session_id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

/// Join a session, enforcing the participant cap in the same statement as
/// the insert. Returns true when a row was added; false means either the
/// cap was hit or the user was already a participant (callers distinguish
/// via `is_session_participant`).
pub async fn add_participant_checked(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO session_participants (session_id, user_id, joined_at, last_active)
        SELECT $1, $2, $3, $3
        WHERE (SELECT COUNT(*) FROM session_participants WHERE session_id = $1)
              < (SELECT max_participants FROM code_sessions WHERE id = $1)
        ON CONFLICT (session_id, user_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_participant(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM session_participants WHERE session_id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_invited_user(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO session_invites (session_id, user_id, invited_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (session_id, user_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite the invite code. Prior holders of the old code lose nothing
/// but the code itself; join-by-id still works for listed participants.
pub async fn set_invite_code(pool: &PgPool, session_id: Uuid, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE code_sessions SET invite_code = $1, updated_at = $2 WHERE id = $3")
        .bind(code)
        .bind(Utc::now())
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn find_by_invite_code(pool: &PgPool, code: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM code_sessions WHERE invite_code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("id")))
}

/// Persist the authoritative code blob.
///
/// Last writer wins: two participants saving from the same stale snapshot
/// race, and the later UPDATE silently replaces the earlier one. There is
/// no version check or merge; this is the documented behavior.
pub async fn update_code(pool: &PgPool, session_id: Uuid, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE code_sessions SET code = $1, updated_at = $2 WHERE id = $3")
        .bind(code)
        .bind(Utc::now())
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Touch a participant's activity timestamp and cursor.
pub async fn update_cursor(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
    position: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE session_participants
        SET cursor_position = $1, last_active = $2
        WHERE session_id = $3 AND user_id = $4
        "#,
    )
    .bind(position)
    .bind(Utc::now())
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn end_session(pool: &PgPool, session_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE code_sessions SET is_active = FALSE, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}
