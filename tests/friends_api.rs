//! Friend request and follow graph integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::create_unique_test_user;
use common::database::TestDatabase;
use common::test_app;

#[tokio::test]
#[serial]
async fn test_duplicate_friend_request_conflicts() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    let first = server
        .post("/api/friends/request")
        .authorization_bearer(&a.token)
        .json(&json!({ "username": b.username }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .post("/api/friends/request")
        .authorization_bearer(&a.token)
        .json(&json!({ "username": b.username }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    // a pending request in the other direction also counts
    let reverse = server
        .post("/api/friends/request")
        .authorization_bearer(&b.token)
        .json(&json!({ "username": a.username }))
        .await;
    assert_eq!(reverse.status_code(), StatusCode::CONFLICT);

    // and self-requests are invalid
    let own = server
        .post("/api/friends/request")
        .authorization_bearer(&a.token)
        .json(&json!({ "username": a.username }))
        .await;
    assert_eq!(own.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_only_recipient_responds_and_accept_creates_friendship() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    let sent: serde_json::Value = server
        .post("/api/friends/request")
        .authorization_bearer(&a.token)
        .json(&json!({ "username": b.username }))
        .await
        .json();
    let request_id = sent["request_id"].as_str().unwrap();

    // the sender cannot accept their own request
    let self_accept = server
        .post("/api/friends/respond")
        .authorization_bearer(&a.token)
        .json(&json!({ "request_id": request_id, "accept": true }))
        .await;
    assert_eq!(self_accept.status_code(), StatusCode::FORBIDDEN);

    let accept = server
        .post("/api/friends/respond")
        .authorization_bearer(&b.token)
        .json(&json!({ "request_id": request_id, "accept": true }))
        .await;
    assert_eq!(accept.status_code(), StatusCode::OK);

    // both sides now list each other
    for (user, other) in [(&a, &b), (&b, &a)] {
        let friends: serde_json::Value = server
            .get("/api/friends")
            .authorization_bearer(&user.token)
            .await
            .json();
        let list = friends["friends"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["username"], other.username.as_str());
    }

    // answering twice is a conflict
    let again = server
        .post("/api/friends/respond")
        .authorization_bearer(&b.token)
        .json(&json!({ "request_id": request_id, "accept": false }))
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    // unfriend removes the relation for both
    let unfriend = server
        .delete(&format!("/api/friends/{}", b.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(unfriend.status_code(), StatusCode::OK);

    let friends: serde_json::Value = server
        .get("/api/friends")
        .authorization_bearer(&b.token)
        .await
        .json();
    assert_eq!(friends["friends"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_follow_graph_rules() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let a = create_unique_test_user(db.pool()).await;
    let b = create_unique_test_user(db.pool()).await;

    // self-follow is invalid
    let own = server
        .post(&format!("/api/user/follow/{}", a.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(own.status_code(), StatusCode::BAD_REQUEST);

    let follow = server
        .post(&format!("/api/user/follow/{}", b.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(follow.status_code(), StatusCode::OK);

    // double follow conflicts
    let again = server
        .post(&format!("/api/user/follow/{}", b.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    // follower listing is public
    let followers: serde_json::Value = server
        .get(&format!("/api/user/follow/{}/followers", b.id))
        .await
        .json();
    assert_eq!(followers["users"].as_array().unwrap().len(), 1);
    assert_eq!(followers["users"][0]["username"], a.username.as_str());

    // profile counts reflect the edge
    let profile: serde_json::Value = server
        .get(&format!("/api/users/{}", b.id))
        .await
        .json();
    assert_eq!(profile["followers"], 1);
    assert_eq!(profile["following"], 0);

    let unfollow = server
        .delete(&format!("/api/user/follow/{}", b.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(unfollow.status_code(), StatusCode::OK);

    let repeat = server
        .delete(&format!("/api/user/follow/{}", b.id))
        .authorization_bearer(&a.token)
        .await;
    assert_eq!(repeat.status_code(), StatusCode::NOT_FOUND);
}
