//! Task API integration tests.
//!
//! Covers the ownership contract (assigner-only edits, assignee-only
//! status changes), reassignment visibility, and the full create ->
//! status -> delete scenario.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::{create_unique_test_user, TestUser};
use common::database::TestDatabase;
use common::test_app;

async fn create_task(
    server: &axum_test::TestServer,
    assigner: &TestUser,
    assignee: &TestUser,
    title: &str,
) -> serde_json::Value {
    let response = server
        .post("/api/tasks")
        .authorization_bearer(&assigner.token)
        .json(&json!({
            "title": title,
            "assigned_to": assignee.id,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
#[serial]
async fn test_third_user_cannot_touch_a_task() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;
    let outsider = create_unique_test_user(db.pool()).await;

    let task = create_task(&server, &assigner, &assignee, "Ship v1").await;
    let task_id = task["id"].as_str().unwrap();

    // outsider cannot even see it
    let read = server
        .get(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&outsider.token)
        .await;
    assert_eq!(read.status_code(), StatusCode::NOT_FOUND);

    // nor update, reassign, change status, or delete
    let update = server
        .put(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&outsider.token)
        .json(&json!({ "title": "Hijacked" }))
        .await;
    assert_eq!(update.status_code(), StatusCode::FORBIDDEN);

    let reassign = server
        .patch(&format!("/api/tasks/{task_id}/assign"))
        .authorization_bearer(&outsider.token)
        .json(&json!({ "assigned_to": outsider.id }))
        .await;
    assert_eq!(reassign.status_code(), StatusCode::FORBIDDEN);

    let status = server
        .patch(&format!("/api/tasks/{task_id}/status"))
        .authorization_bearer(&outsider.token)
        .json(&json!({ "status": "completed" }))
        .await;
    assert_eq!(status.status_code(), StatusCode::FORBIDDEN);

    let delete = server
        .delete(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&outsider.token)
        .await;
    assert_eq!(delete.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_assignee_can_transition_status_but_not_edit() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    let task = create_task(&server, &assigner, &assignee, "Ship v1").await;
    let task_id = task["id"].as_str().unwrap();

    // B cannot edit the title
    let edit = server
        .put(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&assignee.token)
        .json(&json!({ "title": "Renamed by assignee" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::FORBIDDEN);

    // but can move pending -> in_progress
    let status = server
        .patch(&format!("/api/tasks/{task_id}/status"))
        .authorization_bearer(&assignee.token)
        .json(&json!({ "status": "in_progress" }))
        .await;
    assert_eq!(status.status_code(), StatusCode::OK);
    let body: serde_json::Value = status.json();
    assert_eq!(body["status"], "in_progress");

    // the assigner cannot change status
    let status = server
        .patch(&format!("/api/tasks/{task_id}/status"))
        .authorization_bearer(&assigner.token)
        .json(&json!({ "status": "completed" }))
        .await;
    assert_eq!(status.status_code(), StatusCode::FORBIDDEN);

    // garbage status values are a validation error
    let status = server
        .patch(&format!("/api/tasks/{task_id}/status"))
        .authorization_bearer(&assignee.token)
        .json(&json!({ "status": "done-ish" }))
        .await;
    assert_eq!(status.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_delete_hides_task_from_both_parties() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    let task = create_task(&server, &assigner, &assignee, "Ship v1").await;
    let task_id = task["id"].as_str().unwrap();

    let delete = server
        .delete(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&assigner.token)
        .await;
    assert_eq!(delete.status_code(), StatusCode::OK);

    for user in [&assigner, &assignee] {
        let read = server
            .get(&format!("/api/tasks/{task_id}"))
            .authorization_bearer(&user.token)
            .await;
        assert_eq!(read.status_code(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
#[serial]
async fn test_reassignment_moves_task_between_lists() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let first = create_unique_test_user(db.pool()).await;
    let second = create_unique_test_user(db.pool()).await;

    let task = create_task(&server, &assigner, &first, "Rotating duty").await;
    let task_id = task["id"].as_str().unwrap();

    // warm both users' list reads, then reassign
    for user in [&first, &second] {
        server
            .get("/api/tasks?role=assigned")
            .authorization_bearer(&user.token)
            .await;
    }

    let reassign = server
        .patch(&format!("/api/tasks/{task_id}/assign"))
        .authorization_bearer(&assigner.token)
        .json(&json!({ "assigned_to": second.id }))
        .await;
    assert_eq!(reassign.status_code(), StatusCode::OK);

    // subsequent list reads reflect the new assignment with no stale view
    let old_list: serde_json::Value = server
        .get("/api/tasks?role=assigned")
        .authorization_bearer(&first.token)
        .await
        .json();
    assert_eq!(old_list["tasks"].as_array().unwrap().len(), 0);

    let new_list: serde_json::Value = server
        .get("/api/tasks?role=assigned")
        .authorization_bearer(&second.token)
        .await
        .json();
    assert_eq!(new_list["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(new_list["tasks"][0]["id"].as_str().unwrap(), task_id);
}

#[tokio::test]
#[serial]
async fn test_stats_count_by_status() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let assigner = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    let task = create_task(&server, &assigner, &assignee, "One").await;
    create_task(&server, &assigner, &assignee, "Two").await;

    server
        .patch(&format!("/api/tasks/{}/status", task["id"].as_str().unwrap()))
        .authorization_bearer(&assignee.token)
        .json(&json!({ "status": "completed" }))
        .await;

    let stats: serde_json::Value = server
        .get("/api/tasks/stats")
        .authorization_bearer(&assigner.token)
        .await
        .json();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["completed"], 1);
}
