//! Project membership and role-gate integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::auth_helpers::create_unique_test_user;
use common::database::TestDatabase;
use common::test_app;

#[tokio::test]
#[serial]
async fn test_creator_is_implicit_owner_member() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let creator = create_unique_test_user(db.pool()).await;

    let created = server
        .post("/api/projects")
        .authorization_bearer(&creator.token)
        .json(&json!({ "name": "Apollo" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let project: serde_json::Value = created.json();

    let members = project["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user"]["username"], creator.username.as_str());
    assert_eq!(members[0]["role"], "owner");
}

#[tokio::test]
#[serial]
async fn test_membership_role_gates() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let creator = create_unique_test_user(db.pool()).await;
    let admin = create_unique_test_user(db.pool()).await;
    let member = create_unique_test_user(db.pool()).await;
    let outsider = create_unique_test_user(db.pool()).await;

    let project: serde_json::Value = server
        .post("/api/projects")
        .authorization_bearer(&creator.token)
        .json(&json!({ "name": "Apollo" }))
        .await
        .json();
    let project_id = project["id"].as_str().unwrap();

    // creator seats an admin and a plain member
    for (user, role) in [(&admin, "admin"), (&member, "member")] {
        let added = server
            .post(&format!("/api/projects/{project_id}/members"))
            .authorization_bearer(&creator.token)
            .json(&json!({ "user_id": user.id, "role": role }))
            .await;
        assert_eq!(added.status_code(), StatusCode::OK);
    }

    // outsiders cannot even see the project
    let read = server
        .get(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&outsider.token)
        .await;
    assert_eq!(read.status_code(), StatusCode::NOT_FOUND);

    // plain members cannot edit or manage membership
    let edit = server
        .put(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&member.token)
        .json(&json!({ "description": "mine now" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::FORBIDDEN);

    // admins can edit...
    let edit = server
        .put(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&admin.token)
        .json(&json!({ "description": "sprint board" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::OK);

    // ...but role escalation is owner-only
    let escalate = server
        .patch(&format!("/api/projects/{project_id}/members/{}/role", member.id))
        .authorization_bearer(&admin.token)
        .json(&json!({ "role": "admin" }))
        .await;
    assert_eq!(escalate.status_code(), StatusCode::FORBIDDEN);

    let escalate = server
        .patch(&format!("/api/projects/{project_id}/members/{}/role", member.id))
        .authorization_bearer(&creator.token)
        .json(&json!({ "role": "admin" }))
        .await;
    assert_eq!(escalate.status_code(), StatusCode::OK);

    // delete is creator-only, admin or not
    let delete = server
        .delete(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&admin.token)
        .await;
    assert_eq!(delete.status_code(), StatusCode::FORBIDDEN);

    let delete = server
        .delete(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&creator.token)
        .await;
    assert_eq!(delete.status_code(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_project_delete_leaves_tasks_behind() {
    let db = TestDatabase::new().await;
    db.cleanup().await;
    let server = test_app(db.pool().clone());

    let creator = create_unique_test_user(db.pool()).await;
    let assignee = create_unique_test_user(db.pool()).await;

    let project: serde_json::Value = server
        .post("/api/projects")
        .authorization_bearer(&creator.token)
        .json(&json!({ "name": "Apollo" }))
        .await
        .json();
    let project_id = project["id"].as_str().unwrap();

    let task: serde_json::Value = server
        .post("/api/tasks")
        .authorization_bearer(&creator.token)
        .json(&json!({
            "title": "Orphan-to-be",
            "assigned_to": assignee.id,
            "project_id": project_id,
        }))
        .await
        .json();
    let task_id = task["id"].as_str().unwrap();

    server
        .delete(&format!("/api/projects/{project_id}"))
        .authorization_bearer(&creator.token)
        .await;

    // the task survives with its project reference cleared
    let task: serde_json::Value = server
        .get(&format!("/api/tasks/{task_id}"))
        .authorization_bearer(&creator.token)
        .await
        .json();
    assert_eq!(task["project_id"], serde_json::Value::Null);
}
