/**
 * Login Handler
 *
 * Implements POST /api/auth/login. Verifies the bcrypt hash and issues a
 * fresh JWT. Failed lookups and failed verifications are indistinguishable
 * to the caller.
 */

use axum::{extract::State, Json};
use sqlx::PgPool;

use crate::auth::handlers::types::{AuthResponse, LoginRequest, UserResponse};
use crate::auth::sessions::create_token;
use crate::auth::users::get_user_by_email;
use crate::error::ApiError;

/// Login handler.
pub async fn login(
    State(pool): State<PgPool>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = get_user_by_email(&pool, &request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = bcrypt::verify(&request.password, &user.password_hash)
        .map_err(|e| ApiError::internal(format!("Password verification failed: {e}")))?;

    if !valid {
        tracing::debug!("login rejected for {}", request.email);
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = create_token(user.id, &user.username)
        .map_err(|e| ApiError::internal(format!("Failed to create token: {e}")))?;

    tracing::info!("user logged in: {}", user.username);

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}
