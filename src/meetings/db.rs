//! Database operations for meetings.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::meetings::types::{MeetingDto, MeetingStatus};
use crate::users::types::UserSummary;

/// Ownership projection for the authorization gate.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MeetingOwners {
    pub scheduled_by: Uuid,
    pub assigned_to: Uuid,
}

const MEETING_SELECT: &str = r#"
    SELECT m.id, m.title, m.agenda, m.status, m.project_id, m.starts_at,
           m.duration_minutes, m.created_at, m.updated_at,
           sb.id AS sb_id, sb.username AS sb_username,
           sb.display_name AS sb_display_name, sb.avatar_url AS sb_avatar_url,
           ta.id AS at_id, ta.username AS at_username,
           ta.display_name AS at_display_name, ta.avatar_url AS at_avatar_url
    FROM meetings m
    INNER JOIN users sb ON sb.id = m.scheduled_by
    INNER JOIN users ta ON ta.id = m.assigned_to
"#;

fn dto_from_row(row: &sqlx::postgres::PgRow, attendees: Vec<UserSummary>) -> MeetingDto {
    MeetingDto {
        id: row.get("id"),
        title: row.get("title"),
        agenda: row.get("agenda"),
        status: MeetingStatus::from_str(row.get::<String, _>("status").as_str())
            .unwrap_or(MeetingStatus::Scheduled),
        scheduled_by: UserSummary {
            id: row.get("sb_id"),
            username: row.get("sb_username"),
            display_name: row.get("sb_display_name"),
            avatar_url: row.get("sb_avatar_url"),
        },
        assigned_to: UserSummary {
            id: row.get("at_id"),
            username: row.get("at_username"),
            display_name: row.get("at_display_name"),
            avatar_url: row.get("at_avatar_url"),
        },
        project_id: row.get("project_id"),
        starts_at: row.get("starts_at"),
        duration_minutes: row.get("duration_minutes"),
        attendees,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn attendees(pool: &PgPool, meeting_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url
        FROM meeting_attendees ma
        INNER JOIN users u ON u.id = ma.user_id
        WHERE ma.meeting_id = $1
        ORDER BY ma.added_at ASC
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_meeting(
    pool: &PgPool,
    title: &str,
    agenda: Option<&str>,
    scheduled_by: Uuid,
    assigned_to: Uuid,
    project_id: Option<Uuid>,
    starts_at: DateTime<Utc>,
    duration_minutes: i32,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO meetings (id, title, agenda, status, scheduled_by, assigned_to,
                              project_id, starts_at, duration_minutes, created_at, updated_at)
        VALUES ($1, $2, $3, 'scheduled', $4, $5, $6, $7, $8, $9, $9)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(agenda)
    .bind(scheduled_by)
    .bind(assigned_to)
    .bind(project_id)
    .bind(starts_at)
    .bind(duration_minutes)
    .bind(now)
    .execute(pool)
    .await?;

    // The primary attendee is on the roster from the start.
    add_attendee(pool, id, assigned_to).await?;

    Ok(id)
}

pub async fn get_meeting(pool: &PgPool, id: Uuid) -> Result<Option<MeetingDto>, sqlx::Error> {
    let row = sqlx::query(&format!("{MEETING_SELECT} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let roster = attendees(pool, id).await?;
            Ok(Some(dto_from_row(&row, roster)))
        }
        None => Ok(None),
    }
}

pub async fn get_owners(pool: &PgPool, id: Uuid) -> Result<Option<MeetingOwners>, sqlx::Error> {
    sqlx::query_as::<_, MeetingOwners>(
        "SELECT scheduled_by, assigned_to FROM meetings WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Meetings the caller schedules, is primary attendee of, or is on the
/// roster of, optionally filtered by status.
pub async fn list_meetings(
    pool: &PgPool,
    caller: Uuid,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MeetingDto>, sqlx::Error> {
    let mut sql = format!(
        r#"{MEETING_SELECT}
        WHERE (m.scheduled_by = $1 OR m.assigned_to = $1
               OR EXISTS (SELECT 1 FROM meeting_attendees ma
                          WHERE ma.meeting_id = m.id AND ma.user_id = $1))"#
    );
    if status.is_some() {
        sql.push_str(" AND m.status = $2");
    }
    sql.push_str(&format!(" ORDER BY m.starts_at ASC LIMIT {limit} OFFSET {offset}"));

    let mut query = sqlx::query(&sql).bind(caller);
    if let Some(status) = status {
        query = query.bind(status);
    }

    let rows = query.fetch_all(pool).await?;
    let mut meetings = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: Uuid = row.get("id");
        let roster = attendees(pool, id).await?;
        meetings.push(dto_from_row(row, roster));
    }
    Ok(meetings)
}

pub async fn count_meetings(
    pool: &PgPool,
    caller: Uuid,
    status: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut sql = String::from(
        r#"
        SELECT COUNT(*) AS count FROM meetings m
        WHERE (m.scheduled_by = $1 OR m.assigned_to = $1
               OR EXISTS (SELECT 1 FROM meeting_attendees ma
                          WHERE ma.meeting_id = m.id AND ma.user_id = $1))
        "#,
    );
    if status.is_some() {
        sql.push_str(" AND m.status = $2");
    }

    let mut query = sqlx::query(&sql).bind(caller);
    if let Some(status) = status {
        query = query.bind(status);
    }

    let row = query.fetch_one(pool).await?;
    Ok(row.get("count"))
}

pub async fn update_meeting(
    pool: &PgPool,
    id: Uuid,
    title: Option<&str>,
    agenda: Option<&str>,
    starts_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE meetings
        SET title = COALESCE($1, title),
            agenda = COALESCE($2, agenda),
            starts_at = COALESCE($3, starts_at),
            duration_minutes = COALESCE($4, duration_minutes),
            updated_at = $5
        WHERE id = $6
        "#,
    )
    .bind(title)
    .bind(agenda)
    .bind(starts_at)
    .bind(duration_minutes)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: MeetingStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE meetings SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_meeting(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Add to the roster; duplicate adds are a no-op.
pub async fn add_attendee(pool: &PgPool, meeting_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO meeting_attendees (meeting_id, user_id, added_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (meeting_id, user_id) DO NOTHING
        "#,
    )
    .bind(meeting_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_attendee(
    pool: &PgPool,
    meeting_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM meeting_attendees WHERE meeting_id = $1 AND user_id = $2")
            .bind(meeting_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}
