/**
 * Backend Error Types
 *
 * This module defines the error taxonomy used by every HTTP handler.
 * Domain services return these errors; a single conversion layer turns
 * them into HTTP responses.
 *
 * # Error Categories
 *
 * - `NotFound` - a referenced entity id does not resolve, or the caller
 *   lacks visibility into it
 * - `Forbidden` - the caller fails an ownership or role check; state is
 *   never mutated on this path
 * - `Validation` - missing or malformed required input
 * - `Conflict` - duplicate username, duplicate friend request, full
 *   session, and similar uniqueness violations
 * - `Unauthorized` - missing or invalid bearer token
 * - `Database` / `Internal` - infrastructure failures, surfaced as 500
 *
 * Cache and realtime failures are deliberately NOT represented here:
 * they are logged and swallowed at the call site and never fail a request.
 */

use axum::http::StatusCode;
use thiserror::Error;

/// All errors a request handler can surface to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Referenced entity missing or invisible to the caller
    #[error("{0}")]
    NotFound(String),

    /// Caller failed an ownership/role check
    #[error("{0}")]
    Forbidden(String),

    /// Missing or malformed required field
    #[error("{0}")]
    Validation(String),

    /// Uniqueness or state conflict
    #[error("{0}")]
    Conflict(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Persistence failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything else that should read as a server fault
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Map the error to its HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Database details are never leaked.
    pub fn message(&self) -> String {
        match self {
            Self::Database(e) => {
                tracing::error!("database error surfaced to client: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ApiError::not_found("missing").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::forbidden("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::conflict("dup").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::unauthorized("token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_error_is_masked() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn test_message_passthrough() {
        let err = ApiError::conflict("Username already taken");
        assert_eq!(err.message(), "Username already taken");
    }
}
