//! Database operations for profiles and the follow graph.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::users::types::{PublicProfile, UserSummary};

/// Search users by username or display name, paginated.
pub async fn search_users(
    pool: &PgPool,
    query: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<UserSummary>, sqlx::Error> {
    let pattern = format!("%{}%", query);
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, display_name, avatar_url
        FROM users
        WHERE username ILIKE $1 OR display_name ILIKE $1
        ORDER BY username ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Total matches for a search, for the pagination block.
pub async fn count_search(pool: &PgPool, query: &str) -> Result<i64, sqlx::Error> {
    let pattern = format!("%{}%", query);
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM users WHERE username ILIKE $1 OR display_name ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;
    Ok(row.get("count"))
}

/// Public profile with follower/following counts.
pub async fn get_public_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<PublicProfile>, sqlx::Error> {
    sqlx::query_as::<_, PublicProfile>(
        r#"
        SELECT u.id, u.username, u.display_name, u.bio, u.avatar_url,
               (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers,
               (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following,
               u.created_at
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Follow a user. Returns false when the edge already existed.
pub async fn follow(pool: &PgPool, follower: Uuid, followee: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO follows (follower_id, followee_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (follower_id, followee_id) DO NOTHING
        "#,
    )
    .bind(follower)
    .bind(followee)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unfollow a user. Returns false when no edge existed.
pub async fn unfollow(pool: &PgPool, follower: Uuid, followee: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
        .bind(follower)
        .bind(followee)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Users following `user_id`.
pub async fn followers(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url
        FROM follows f
        INNER JOIN users u ON u.id = f.follower_id
        WHERE f.followee_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Users `user_id` follows.
pub async fn following(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url
        FROM follows f
        INNER JOIN users u ON u.id = f.followee_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Populated summary of one user; `None` when the id does not resolve.
pub async fn get_summary(pool: &PgPool, user_id: Uuid) -> Result<Option<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, display_name, avatar_url FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
