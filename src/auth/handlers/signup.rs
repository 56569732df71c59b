/**
 * Signup Handler
 *
 * Implements user registration for POST /api/auth/signup.
 *
 * # Validation
 *
 * - Username: 3-30 chars, starts with a letter, alphanumeric + underscore
 * - Email must contain '@' (basic validation)
 * - Password must be at least 8 characters
 * - Username and email must be unique (409 otherwise)
 *
 * # Security
 *
 * Passwords are hashed with bcrypt at DEFAULT_COST and never returned.
 * The JWT is issued immediately so signup doubles as login.
 */

use axum::{extract::State, Json};
use bcrypt::{hash, DEFAULT_COST};
use sqlx::PgPool;

use crate::auth::handlers::types::{AuthResponse, SignupRequest, UserResponse};
use crate::auth::sessions::create_token;
use crate::auth::users::{create_user, get_user_by_email, get_user_by_username};
use crate::error::ApiError;

/// Validate username format.
///
/// Usernames must be 3-30 characters, start with a letter, and contain
/// only alphanumeric characters and underscores.
pub(crate) fn is_valid_username(username: &str) -> bool {
    if username.len() < 3 || username.len() > 30 {
        return false;
    }

    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Sign up handler.
pub async fn signup(
    State(pool): State<PgPool>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    tracing::info!("signup request for username: {}", request.username);

    if !is_valid_username(&request.username) {
        return Err(ApiError::validation(
            "Username must be 3-30 chars, start with a letter, and contain only letters, numbers, and underscores",
        ));
    }

    if !request.email.contains('@') {
        return Err(ApiError::validation("Invalid email format"));
    }

    if request.password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if get_user_by_username(&pool, &request.username).await?.is_some() {
        return Err(ApiError::conflict("Username already taken"));
    }

    if get_user_by_email(&pool, &request.email).await?.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash(&request.password, DEFAULT_COST)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    let user = create_user(&pool, request.username.clone(), request.email.clone(), password_hash)
        .await?;

    let token = create_token(user.id, &user.username)
        .map_err(|e| ApiError::internal(format!("Failed to create token: {e}")))?;

    tracing::info!("user created: {} ({})", user.username, user.id);

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a_b_c123"));
        assert!(is_valid_username("Xyz"));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("1starts_with_digit"));
        assert!(!is_valid_username("_underscore_first"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(31)));
    }
}
