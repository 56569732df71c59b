//! Chat API integration tests: direct-chat idempotency, participant
//! gating, message edit/soft-delete, and read marking.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::{create_unique_test_user, TestUser};
use common::database::TestDatabase;
use common::test_app;

async fn create_direct_chat(
    server: &axum_test::TestServer,
    caller: &TestUser,
    other: &TestUser,
) -> serde_json::Value {
    server
        .post("/api/chats")
        .authorization_bearer(&caller.token)
        .json(&json!({
            "chat_type": "direct",
            "participants": [other.id],
        }))
        .await
        .json()
}

#[tokio::test]
#[serial]
async fn test_direct_chat_is_idempotent_by_pair() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    let first = server
        .post("/api/chats")
        .authorization_bearer(&a.token)
        .json(&json!({ "chat_type": "direct", "participants": [b.id] }))
        .await;
    assert_eq!(first.status_code(), StatusCode::CREATED);
    let first: serde_json::Value = first.json();

    // same pair again, from the other side, returns the existing chat
    let second = server
        .post("/api/chats")
        .authorization_bearer(&b.token)
        .json(&json!({ "chat_type": "direct", "participants": [a.id] }))
        .await;
    assert_eq!(second.status_code(), StatusCode::OK);
    let second: serde_json::Value = second.json();

    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
#[serial]
async fn test_chat_creation_validation() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    // direct chat with nobody else
    let response = server
        .post("/api/chats")
        .authorization_bearer(&a.token)
        .json(&json!({ "chat_type": "direct", "participants": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // group chat needs a name
    let c = create_unique_test_user(db.pool()).await;
    let response = server
        .post("/api/chats")
        .authorization_bearer(&a.token)
        .json(&json!({ "chat_type": "group", "participants": [b.id, c.id] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // and at least two others
    let response = server
        .post("/api/chats")
        .authorization_bearer(&a.token)
        .json(&json!({
            "chat_type": "group",
            "participants": [b.id],
            "name": "Pair",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_non_participant_cannot_send_or_read() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;
    let outsider = create_unique_test_user(db.pool()).await;

    let chat = create_direct_chat(&server, &a, &b).await;
    let chat_id = chat["id"].as_str().unwrap();

    let send = server
        .post(&format!("/api/chats/{chat_id}/messages"))
        .authorization_bearer(&outsider.token)
        .json(&json!({ "content": "let me in" }))
        .await;
    assert_eq!(send.status_code(), StatusCode::NOT_FOUND);

    let read = server
        .get(&format!("/api/chats/{chat_id}/messages"))
        .authorization_bearer(&outsider.token)
        .await;
    assert_eq!(read.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_message_edit_and_soft_delete() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    let chat = create_direct_chat(&server, &a, &b).await;
    let chat_id = chat["id"].as_str().unwrap();

    let sent = server
        .post(&format!("/api/chats/{chat_id}/messages"))
        .authorization_bearer(&a.token)
        .json(&json!({ "content": "first draft" }))
        .await;
    assert_eq!(sent.status_code(), StatusCode::CREATED);
    let message: serde_json::Value = sent.json();
    let message_id = message["id"].as_str().unwrap();

    // only the sender may edit
    let edit = server
        .put(&format!("/api/messages/{message_id}"))
        .authorization_bearer(&b.token)
        .json(&json!({ "content": "hijacked" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::FORBIDDEN);

    let edit = server
        .put(&format!("/api/messages/{message_id}"))
        .authorization_bearer(&a.token)
        .json(&json!({ "content": "second draft" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::OK);
    let edited: serde_json::Value = edit.json();
    assert_eq!(edited["is_edited"], true);
    assert_eq!(edited["content"], "second draft");

    // soft delete redacts but keeps the row
    let delete = server
        .delete(&format!("/api/messages/{message_id}"))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(delete.status_code(), StatusCode::OK);

    let listing: serde_json::Value = server
        .get(&format!("/api/chats/{chat_id}/messages"))
        .authorization_bearer(&b.token)
        .await
        .json();
    let messages = listing["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["is_deleted"], true);
    assert_eq!(messages[0]["content"], "This message was deleted");

    // deleted messages cannot be edited again
    let edit = server
        .put(&format!("/api/messages/{message_id}"))
        .authorization_bearer(&a.token)
        .json(&json!({ "content": "necromancy" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn test_mark_read_clears_unread_count() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    let chat = create_direct_chat(&server, &a, &b).await;
    let chat_id = chat["id"].as_str().unwrap();

    for content in ["one", "two", "three"] {
        server
            .post(&format!("/api/chats/{chat_id}/messages"))
            .authorization_bearer(&a.token)
            .json(&json!({ "content": content }))
            .await;
    }

    let chats: serde_json::Value = server
        .get("/api/chats")
        .authorization_bearer(&b.token)
        .await
        .json();
    assert_eq!(chats["chats"][0]["unread_count"], 3);

    let marked = server
        .post(&format!("/api/chats/{chat_id}/read"))
        .authorization_bearer(&b.token)
        .await;
    assert_eq!(marked.status_code(), StatusCode::OK);
    let marked: serde_json::Value = marked.json();
    assert_eq!(marked["marked"], 3);

    let chats: serde_json::Value = server
        .get("/api/chats")
        .authorization_bearer(&b.token)
        .await
        .json();
    assert_eq!(chats["chats"][0]["unread_count"], 0);
}
