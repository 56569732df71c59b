//! Database operations for projects and their membership.
//!
//! Deleting a project removes its membership rows (FK cascade) but leaves
//! tasks and meetings in place with `project_id` set NULL; there is no
//! deep cascade.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::projects::types::{Member, MemberRole, ProjectDto};
use crate::users::types::UserSummary;

pub async fn members(pool: &PgPool, project_id: Uuid) -> Result<Vec<Member>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url, pm.role, pm.joined_at
        FROM project_members pm
        INNER JOIN users u ON u.id = pm.user_id
        WHERE pm.project_id = $1
        ORDER BY pm.joined_at ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Member {
            user: UserSummary {
                id: row.get("id"),
                username: row.get("username"),
                display_name: row.get("display_name"),
                avatar_url: row.get("avatar_url"),
            },
            role: MemberRole::from_str(row.get::<String, _>("role").as_str())
                .unwrap_or(MemberRole::Member),
            joined_at: row.get("joined_at"),
        })
        .collect())
}

/// The caller's role in the project, if any. The creator is always an
/// implicit owner even if the membership row were missing.
pub async fn member_role(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MemberRole>, sqlx::Error> {
    let creator = sqlx::query("SELECT created_by FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    let Some(creator) = creator else {
        return Ok(None);
    };
    if creator.get::<Uuid, _>("created_by") == user_id {
        return Ok(Some(MemberRole::Owner));
    }

    let row = sqlx::query("SELECT role FROM project_members WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| MemberRole::from_str(r.get::<String, _>("role").as_str())))
}

pub async fn insert_project(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
    team_id: Option<Uuid>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO projects (id, name, description, status, created_by, team_id, created_at, updated_at)
        VALUES ($1, $2, $3, 'active', $4, $5, $6, $6)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .bind(team_id)
    .bind(now)
    .execute(pool)
    .await?;

    // creator is always an implicit owner member
    sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id, role, joined_at)
        VALUES ($1, $2, 'owner', $3)
        "#,
    )
    .bind(id)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Option<ProjectDto>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT p.id, p.name, p.description, p.status, p.team_id, p.created_at, p.updated_at,
               u.id AS creator_id, u.username AS creator_username,
               u.display_name AS creator_display_name, u.avatar_url AS creator_avatar_url,
               (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count,
               (SELECT COUNT(*) FROM meetings m WHERE m.project_id = p.id) AS meeting_count
        FROM projects p
        INNER JOIN users u ON u.id = p.created_by
        WHERE p.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let member_list = members(pool, id).await?;

    Ok(Some(ProjectDto {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        status: row.get("status"),
        created_by: UserSummary {
            id: row.get("creator_id"),
            username: row.get("creator_username"),
            display_name: row.get("creator_display_name"),
            avatar_url: row.get("creator_avatar_url"),
        },
        team_id: row.get("team_id"),
        members: member_list,
        task_count: row.get("task_count"),
        meeting_count: row.get("meeting_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Projects the user belongs to, newest first.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ProjectDto>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT p.id, p.created_at
        FROM projects p
        LEFT JOIN project_members pm ON pm.project_id = p.id
        WHERE p.created_by = $1 OR pm.user_id = $1
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        if let Some(project) = get_project(pool, id).await? {
            projects.push(project);
        }
    }
    Ok(projects)
}

pub async fn update_project(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    status: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE projects
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            status = COALESCE($3, status),
            updated_at = $4
        WHERE id = $5
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(status)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_project(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_member(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (project_id, user_id) DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_member(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_member_role(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE project_members SET role = $1 WHERE project_id = $2 AND user_id = $3")
            .bind(role.as_str())
            .bind(project_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Creator id, for the creator-only delete gate.
pub async fn creator_of(pool: &PgPool, project_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("SELECT created_by FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("created_by")))
}
