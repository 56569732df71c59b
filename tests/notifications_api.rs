//! Notification integration tests: side-effect creation and read marking
//! scoped strictly to the caller.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::create_unique_test_user;
use common::database::TestDatabase;
use common::test_app;

#[tokio::test]
#[serial]
async fn test_task_assignment_notifies_the_assignee() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    server
        .post("/api/tasks")
        .authorization_bearer(&assigner.token)
        .json(&json!({ "title": "Review PR", "assigned_to": assignee.id }))
        .await;

    let list: serde_json::Value = server
        .get("/api/notifications")
        .authorization_bearer(&assignee.token)
        .await
        .json();
    let notifications = list["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "task_assigned");
    assert_eq!(notifications[0]["is_read"], false);
    assert_eq!(list["unread"], 1);

    // the assigner got nothing
    let own: serde_json::Value = server
        .get("/api/notifications")
        .authorization_bearer(&assigner.token)
        .await
        .json();
    assert_eq!(own["notifications"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_read_all_marks_only_the_callers_rows() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let first = create_unique_test_user(db.pool()).await;
    let second = create_unique_test_user(db.pool()).await;

    for (title, assignee) in [("One", &first), ("Two", &first), ("Three", &second)] {
        server
            .post("/api/tasks")
            .authorization_bearer(&assigner.token)
            .json(&json!({ "title": title, "assigned_to": assignee.id }))
            .await;
    }

    let marked = server
        .patch("/api/notifications/read-all")
        .authorization_bearer(&first.token)
        .await;
    assert_eq!(marked.status_code(), StatusCode::OK);
    let marked: serde_json::Value = marked.json();
    assert_eq!(marked["updated"], 2);

    // every notification of the caller is read now
    let own: serde_json::Value = server
        .get("/api/notifications")
        .authorization_bearer(&first.token)
        .await
        .json();
    assert_eq!(own["unread"], 0);
    assert!(own["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["is_read"] == true));

    // the other user's rows are untouched
    let other: serde_json::Value = server
        .get("/api/notifications")
        .authorization_bearer(&second.token)
        .await
        .json();
    assert_eq!(other["unread"], 1);
}

#[tokio::test]
#[serial]
async fn test_mark_single_is_recipient_only() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    server
        .post("/api/tasks")
        .authorization_bearer(&assigner.token)
        .json(&json!({ "title": "Review PR", "assigned_to": assignee.id }))
        .await;

    let list: serde_json::Value = server
        .get("/api/notifications")
        .authorization_bearer(&assignee.token)
        .await
        .json();
    let id = list["notifications"][0]["id"].as_str().unwrap();

    // someone else's notification id reads as missing
    let foreign = server
        .patch(&format!("/api/notifications/{id}/read"))
        .authorization_bearer(&assigner.token)
        .await;
    assert_eq!(foreign.status_code(), StatusCode::NOT_FOUND);

    let own = server
        .patch(&format!("/api/notifications/{id}/read"))
        .authorization_bearer(&assignee.token)
        .await;
    assert_eq!(own.status_code(), StatusCode::OK);
}
