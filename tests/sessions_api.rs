//! Code-session API integration tests: capacity enforcement, the
//! invite-code join flow, last-writer-wins saves, and session teardown.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::{create_unique_test_user, TestUser};
use common::database::TestDatabase;
use common::test_app;

async fn create_session(
    server: &axum_test::TestServer,
    owner: &TestUser,
    max_participants: i32,
    is_public: bool,
) -> serde_json::Value {
    let response = server
        .post("/api/code-sessions")
        .authorization_bearer(&owner.token)
        .json(&json!({
            "title": "pairing",
            "language": "rust",
            "max_participants": max_participants,
            "is_public": is_public,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
#[serial]
async fn test_max_participants_bounds_validated() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());
    let owner = create_unique_test_user(db.pool()).await;

    for bad in [1, 11] {
        let response = server
            .post("/api/code-sessions")
            .authorization_bearer(&owner.token)
            .json(&json!({ "title": "pairing", "max_participants": bad }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
#[serial]
async fn test_join_respects_capacity() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let owner = create_unique_test_user(db.pool()).await;
    // capacity 3: owner + two more
    let session = create_session(&server, &owner, 3, true).await;
    let session_id = session["id"].as_str().unwrap();

    let second = create_unique_test_user(db.pool()).await;
    let third = create_unique_test_user(db.pool()).await;
    let fourth = create_unique_test_user(db.pool()).await;

    // joining at capacity-1 succeeds and fills the session
    for user in [&second, &third] {
        let join = server
            .post(&format!("/api/code-sessions/{session_id}/join"))
            .authorization_bearer(&user.token)
            .await;
        assert_eq!(join.status_code(), StatusCode::OK);
    }

    // one past the cap is rejected
    let join = server
        .post(&format!("/api/code-sessions/{session_id}/join"))
        .authorization_bearer(&fourth.token)
        .await;
    assert_eq!(join.status_code(), StatusCode::CONFLICT);

    // re-join of an existing participant is a no-op, not a rejection
    let rejoin = server
        .post(&format!("/api/code-sessions/{session_id}/join"))
        .authorization_bearer(&second.token)
        .await;
    assert_eq!(rejoin.status_code(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_private_sessions_need_an_invite() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let owner = create_unique_test_user(db.pool()).await;
    let stranger = create_unique_test_user(db.pool()).await;

    let session = create_session(&server, &owner, 5, false).await;
    let session_id = session["id"].as_str().unwrap();

    let join = server
        .post(&format!("/api/code-sessions/{session_id}/join"))
        .authorization_bearer(&stranger.token)
        .await;
    assert_eq!(join.status_code(), StatusCode::FORBIDDEN);

    // only the owner can mint invite codes
    let invite = server
        .post(&format!("/api/code-sessions/{session_id}/invite"))
        .authorization_bearer(&stranger.token)
        .await;
    assert_eq!(invite.status_code(), StatusCode::FORBIDDEN);

    let invite = server
        .post(&format!("/api/code-sessions/{session_id}/invite"))
        .authorization_bearer(&owner.token)
        .await;
    assert_eq!(invite.status_code(), StatusCode::OK);
    let invite: serde_json::Value = invite.json();
    let code = invite["invite_code"].as_str().unwrap();
    assert_eq!(code.len(), 8);

    // anyone with the code gets in and lands on the invited list
    let join = server
        .post(&format!("/api/code-sessions/join/{code}"))
        .authorization_bearer(&stranger.token)
        .await;
    assert_eq!(join.status_code(), StatusCode::OK);
    let joined: serde_json::Value = join.json();
    assert!(joined["invited_users"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v.as_str() == Some(&stranger.id.to_string())));

    // the invite code is only visible to the owner
    let view: serde_json::Value = server
        .get(&format!("/api/code-sessions/{session_id}"))
        .authorization_bearer(&stranger.token)
        .await
        .json();
    assert!(view.get("invite_code").is_none());
}

#[tokio::test]
#[serial]
async fn test_code_save_is_last_writer_wins() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let owner = create_unique_test_user(db.pool()).await;
    let partner = create_unique_test_user(db.pool()).await;

    let session = create_session(&server, &owner, 5, true).await;
    let session_id = session["id"].as_str().unwrap();

    server
        .post(&format!("/api/code-sessions/{session_id}/join"))
        .authorization_bearer(&partner.token)
        .await;

    // both save from the same (empty) snapshot; the later save wins whole
    let first = server
        .put(&format!("/api/code-sessions/{session_id}/code"))
        .authorization_bearer(&owner.token)
        .json(&json!({ "code": "fn owner() {}" }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .put(&format!("/api/code-sessions/{session_id}/code"))
        .authorization_bearer(&partner.token)
        .json(&json!({ "code": "fn partner() {}" }))
        .await;
    assert_eq!(second.status_code(), StatusCode::OK);
    let body: serde_json::Value = second.json();
    assert_eq!(body["code"], "fn partner() {}");

    // non-participants cannot save
    let outsider = create_unique_test_user(db.pool()).await;
    let save = server
        .put(&format!("/api/code-sessions/{session_id}/code"))
        .authorization_bearer(&outsider.token)
        .json(&json!({ "code": "fn outsider() {}" }))
        .await;
    assert_eq!(save.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_end_session_is_owner_only_and_blocks_joins() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let owner = create_unique_test_user(db.pool()).await;
    let member = create_unique_test_user(db.pool()).await;

    let session = create_session(&server, &owner, 5, true).await;
    let session_id = session["id"].as_str().unwrap();

    let end = server
        .post(&format!("/api/code-sessions/{session_id}/end"))
        .authorization_bearer(&member.token)
        .await;
    assert_eq!(end.status_code(), StatusCode::FORBIDDEN);

    let end = server
        .post(&format!("/api/code-sessions/{session_id}/end"))
        .authorization_bearer(&owner.token)
        .await;
    assert_eq!(end.status_code(), StatusCode::OK);

    let join = server
        .post(&format!("/api/code-sessions/{session_id}/join"))
        .authorization_bearer(&member.token)
        .await;
    assert_eq!(join.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn test_public_listing_requires_no_auth() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let owner = create_unique_test_user(db.pool()).await;
    create_session(&server, &owner, 5, true).await;
    create_session(&server, &owner, 5, false).await;

    let listing = server.get("/api/code-sessions").await;
    assert_eq!(listing.status_code(), StatusCode::OK);
    let body: serde_json::Value = listing.json();
    // only the public session shows up
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);
}
