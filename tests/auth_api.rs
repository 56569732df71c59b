//! Auth API integration tests: signup validation ladder, login, and the
//! authenticated profile read.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::create_unique_test_user;
use common::database::TestDatabase;
use common::test_app;

#[tokio::test]
#[serial]
async fn test_signup_returns_token_and_user() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let response = server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
#[serial]
async fn test_signup_rejects_bad_input() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    // invalid username (starts with a digit)
    let response = server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "1alice",
            "email": "alice@example.com",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // invalid email
    let response = server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "alice",
            "email": "not-an-email",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // short password
    let response = server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "short",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_signup_duplicate_username_conflicts() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let body = json!({
        "username": "bob",
        "email": "bob@example.com",
        "password": "password123",
    });
    let first = server.post("/api/auth/signup").json(&body).await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "bob",
            "email": "other@example.com",
            "password": "password123",
        }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = second.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[serial]
async fn test_login_round_trip() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    server
        .post("/api/auth/signup")
        .json(&json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "password123",
        }))
        .await;

    let ok = server
        .post("/api/auth/login")
        .json(&json!({ "email": "carol@example.com", "password": "password123" }))
        .await;
    assert_eq!(ok.status_code(), StatusCode::OK);

    let bad = server
        .post("/api/auth/login")
        .json(&json!({ "email": "carol@example.com", "password": "wrong-password" }))
        .await;
    assert_eq!(bad.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_me_requires_token() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let anonymous = server.get("/api/auth/me").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let user = create_unique_test_user(db.pool()).await;
    let me = server
        .get("/api/auth/me")
        .authorization_bearer(&user.token)
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let body: serde_json::Value = me.json();
    assert_eq!(body["username"], user.username);
}
