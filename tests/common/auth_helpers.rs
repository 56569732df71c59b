//! Authentication test helpers.

use sqlx::PgPool;
use uuid::Uuid;

use crewspace::auth::sessions::create_token;
use crewspace::auth::users::create_user;

/// Test user credentials plus a ready-to-use bearer token.
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

/// Create a test user in the database and mint a token for them.
pub async fn create_test_user(pool: &PgPool, username: &str, password: &str) -> TestUser {
    let email = format!("{}@example.com", username);
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).expect("bcrypt hash failed");

    let user = create_user(pool, username.to_string(), email.clone(), password_hash)
        .await
        .expect("failed to create test user");

    let token = create_token(user.id, &user.username).expect("failed to create test token");

    TestUser {
        id: user.id,
        username: user.username,
        email: user.email,
        token,
    }
}

/// Create a test user with a unique generated username.
pub async fn create_unique_test_user(pool: &PgPool) -> TestUser {
    let suffix = Uuid::new_v4().simple().to_string();
    let username = format!("user_{}", &suffix[..12]);
    create_test_user(pool, &username, "test_password_123").await
}
