//! Database operations for teams and their membership.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::projects::types::{Member, MemberRole};
use crate::teams::types::TeamDto;
use crate::users::types::UserSummary;

pub async fn members(pool: &PgPool, team_id: Uuid) -> Result<Vec<Member>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url, tm.role, tm.joined_at
        FROM team_members tm
        INNER JOIN users u ON u.id = tm.user_id
        WHERE tm.team_id = $1
        ORDER BY tm.joined_at ASC
        "#,
    )
    .bind(team_id)
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

pub async fn member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MemberRole>, sqlx::Error> {
    let creator = sqlx::query("SELECT created_by FROM teams WHERE id = $1")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

    let Some(creator) = creator else {
        return Ok(None);
    };
    if creator.get::<Uuid, _>("created_by") == user_id {
        return Ok(Some(MemberRole::Owner));
    }

    let row = sqlx::query("SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| MemberRole::from_str(r.get::<String, _>("role").as_str())))
}

pub async fn insert_team(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO teams (id, name, description, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO team_members (team_id, user_id, role, joined_at)
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

pub async fn get_team(pool: &PgPool, id: Uuid) -> Result<Option<TeamDto>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT t.id, t.name, t.description, t.created_at, t.updated_at,
               u.id AS creator_id, u.username AS creator_username,
               u.display_name AS creator_display_name, u.avatar_url AS creator_avatar_url,
               (SELECT COUNT(*) FROM projects p WHERE p.team_id = t.id) AS project_count
        FROM teams t
        INNER JOIN users u ON u.id = t.created_by
        WHERE t.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let member_list = members(pool, id).await?;

    Ok(Some(TeamDto {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_by: UserSummary {
            id: row.get("creator_id"),
            username: row.get("creator_username"),
            display_name: row.get("creator_display_name"),
            avatar_url: row.get("creator_avatar_url"),
        },
        members: member_list,
        project_count: row.get("project_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<TeamDto>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT t.id, t.created_at
        FROM teams t
        LEFT JOIN team_members tm ON tm.team_id = t.id
        WHERE t.created_by = $1 OR tm.user_id = $1
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut teams = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        if let Some(team) = get_team(pool, id).await? {
            teams.push(team);
        }
    }
    Ok(teams)
}

pub async fn update_team(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE teams
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_team(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_member(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO team_members (team_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (team_id, user_id) DO NOTHING
        "#,
    )
    .bind(team_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_member(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE team_members SET role = $1 WHERE team_id = $2 AND user_id = $3")
        .bind(role.as_str())
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn creator_of(pool: &PgPool, team_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("SELECT created_by FROM teams WHERE id = $1")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("created_by")))
}
