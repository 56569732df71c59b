/**
 * Session Management and JWT Tokens
 *
 * This module handles JWT token generation and validation for user
 * sessions. Tokens are HS256 with a 30-day expiration.
 */

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Username
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Get JWT secret from environment
fn get_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using development default");
        "dev-secret-change-in-production".to_string()
    })
}

/// Create a JWT token for a user
pub fn create_token(
    user_id: uuid::Uuid,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    // Token expires in 30 days
    let exp = now + (30 * 24 * 60 * 60);

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp,
        iat: now,
    };

    let secret = get_jwt_secret();
    let key = EncodingKey::from_secret(secret.as_ref());

    encode(&Header::default(), &claims, &key)
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &key, &validation)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_token() {
        let user_id = uuid::Uuid::new_v4();
        let token = create_token(user_id, "alice").unwrap();
        assert!(!token.is_empty());
    }

    #[test]
    fn test_verify_token_round_trip() {
        let user_id = uuid::Uuid::new_v4();
        let token = create_token(user_id, "alice").unwrap();

        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_verify_invalid_token() {
        assert!(verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = create_token(uuid::Uuid::new_v4(), "alice").unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(verify_token(&tampered).is_err());
    }
}
