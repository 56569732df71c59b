/**
 * Current User Handler
 *
 * Implements GET /api/auth/me: resolve the caller from the middleware
 * identity and return the profile.
 */

use axum::{extract::State, Json};
use sqlx::PgPool;

use crate::auth::handlers::types::UserResponse;
use crate::auth::users::get_user_by_id;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Get the authenticated caller's own profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = get_user_by_id(&pool, caller.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}
