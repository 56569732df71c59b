//! Database operations for tasks.
//!
//! Reads populate both user references via JOIN and return the shaped
//! `TaskDto`; ownership checks use the lightweight `TaskOwners` projection
//! so authorization never depends on a possibly-stale cached view.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::tasks::types::{TaskDto, TaskFilters, TaskPriority, TaskStats, TaskStatus};
use crate::users::types::UserSummary;

/// Ownership projection used by the authorization gate.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct TaskOwners {
    pub assigned_by: Uuid,
    pub assigned_to: Uuid,
}

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.priority, t.project_id,
           t.due_date, t.created_at, t.updated_at,
           ab.id AS ab_id, ab.username AS ab_username,
           ab.display_name AS ab_display_name, ab.avatar_url AS ab_avatar_url,
           ta.id AS at_id, ta.username AS at_username,
           ta.display_name AS at_display_name, ta.avatar_url AS at_avatar_url
    FROM tasks t
    INNER JOIN users ab ON ab.id = t.assigned_by
    INNER JOIN users ta ON ta.id = t.assigned_to
"#;

fn dto_from_row(row: &sqlx::postgres::PgRow) -> TaskDto {
    TaskDto {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: TaskStatus::from_str(row.get::<String, _>("status").as_str())
            .unwrap_or(TaskStatus::Pending),
        priority: TaskPriority::from_str(row.get::<String, _>("priority").as_str())
            .unwrap_or(TaskPriority::Medium),
        assigned_by: UserSummary {
            id: row.get("ab_id"),
            username: row.get("ab_username"),
            display_name: row.get("ab_display_name"),
            avatar_url: row.get("ab_avatar_url"),
        },
        assigned_to: UserSummary {
            id: row.get("at_id"),
            username: row.get("at_username"),
            display_name: row.get("at_display_name"),
            avatar_url: row.get("at_avatar_url"),
        },
        project_id: row.get("project_id"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert a task and return its id.
#[allow(clippy::too_many_arguments)]
pub async fn insert_task(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    assigned_by: Uuid,
    assigned_to: Uuid,
    project_id: Option<Uuid>,
    priority: TaskPriority,
    due_date: Option<DateTime<Utc>>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, status, priority, assigned_by,
                           assigned_to, project_id, due_date, created_at, updated_at)
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $9)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(priority.as_str())
    .bind(assigned_by)
    .bind(assigned_to)
    .bind(project_id)
    .bind(due_date)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// One populated task.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<TaskDto>, sqlx::Error> {
    let row = sqlx::query(&format!("{TASK_SELECT} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(dto_from_row))
}

/// Ownership pair for the authorization gate.
pub async fn get_owners(pool: &PgPool, id: Uuid) -> Result<Option<TaskOwners>, sqlx::Error> {
    sqlx::query_as::<_, TaskOwners>("SELECT assigned_by, assigned_to FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn filter_clause(filters: &TaskFilters) -> String {
    let mut clause = String::from(
        match filters.role.as_deref() {
            Some("assigned") => " WHERE t.assigned_to = $1",
            Some("created") => " WHERE t.assigned_by = $1",
            _ => " WHERE (t.assigned_by = $1 OR t.assigned_to = $1)",
        },
    );
    if filters.status.is_some() {
        clause.push_str(" AND t.status = $2");
    }
    if filters.project_id.is_some() {
        clause.push_str(if filters.status.is_some() {
            " AND t.project_id = $3"
        } else {
            " AND t.project_id = $2"
        });
    }
    clause
}

/// Tasks visible to the caller, filtered and paginated.
pub async fn list_tasks(
    pool: &PgPool,
    caller: Uuid,
    filters: &TaskFilters,
    limit: i64,
    offset: i64,
) -> Result<Vec<TaskDto>, sqlx::Error> {
    let clause = filter_clause(filters);
    let sql = format!("{TASK_SELECT}{clause} ORDER BY t.created_at DESC LIMIT {limit} OFFSET {offset}");

    let mut query = sqlx::query(&sql).bind(caller);
    if let Some(status) = &filters.status {
        query = query.bind(status);
    }
    if let Some(project_id) = filters.project_id {
        query = query.bind(project_id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(dto_from_row).collect())
}

/// Total matches for the same filter set.
pub async fn count_tasks(
    pool: &PgPool,
    caller: Uuid,
    filters: &TaskFilters,
) -> Result<i64, sqlx::Error> {
    let clause = filter_clause(filters);
    let sql = format!("SELECT COUNT(*) AS count FROM tasks t{clause}");

    let mut query = sqlx::query(&sql).bind(caller);
    if let Some(status) = &filters.status {
        query = query.bind(status);
    }
    if let Some(project_id) = filters.project_id {
        query = query.bind(project_id);
    }

    let row = query.fetch_one(pool).await?;
    Ok(row.get("count"))
}

/// Update the editable fields. `None` leaves a field untouched.
pub async fn update_task(
    pool: &PgPool,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    priority: Option<TaskPriority>,
    due_date: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = COALESCE($1, title),
            description = COALESCE($2, description),
            priority = COALESCE($3, priority),
            due_date = COALESCE($4, due_date),
            updated_at = $5
        WHERE id = $6
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(priority.map(|p| p.as_str()))
    .bind(due_date)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_status(pool: &PgPool, id: Uuid, status: TaskStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn reassign(pool: &PgPool, id: Uuid, assigned_to: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET assigned_to = $1, updated_at = $2 WHERE id = $3")
        .bind(assigned_to)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Hard delete. Returns false when the id did not resolve.
pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts by status over every task the user is a party to.
pub async fn stats_for_user(pool: &PgPool, user_id: Uuid) -> Result<TaskStats, sqlx::Error> {
    sqlx::query_as::<_, TaskStats>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
               COUNT(*) FILTER (WHERE status = 'completed') AS completed,
               COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
        FROM tasks
        WHERE assigned_by = $1 OR assigned_to = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}
