/**
 * Authentication Middleware
 *
 * Protects routes that require a signed-in caller. The middleware:
 *
 * 1. Extracts the JWT from the `Authorization: Bearer <token>` header
 * 2. Verifies the token signature and expiry
 * 3. Re-resolves the user row from the database, so permissions are always
 *    derived from current persisted state rather than stale claims
 * 4. Attaches `AuthenticatedUser` to request extensions for handlers
 *
 * Rejections are 401 and never mutate state.
 */

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::sessions::verify_token;
use crate::auth::users::get_user_by_id;
use crate::error::ApiError;
use crate::server::state::AppState;

/// Authenticated caller identity attached to the request.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Bearer-token authentication middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!("missing Authorization header");
            ApiError::unauthorized("Missing Authorization header")
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!("malformed Authorization header");
        ApiError::unauthorized("Invalid Authorization header format")
    })?;

    let claims = verify_token(token).map_err(|e| {
        tracing::debug!("token rejected: {:?}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;

    // The account may have been deleted since the token was issued.
    let user = resolve_user(&state.pool, user_id).await?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: user.0,
        username: user.1,
    });

    Ok(next.run(request).await)
}

async fn resolve_user(pool: &PgPool, user_id: Uuid) -> Result<(Uuid, String), ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;
    Ok((user.id, user.username))
}

/// Axum extractor for the authenticated caller.
///
/// Handlers take `AuthUser(caller): AuthUser` to get the identity the
/// middleware attached; using it on a route outside the protected group
/// is a 401.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser missing from request extensions");
                ApiError::unauthorized("Authentication required")
            })?;

        Ok(AuthUser(user))
    }
}
