/**
 * Project HTTP Handlers
 *
 * Role contract:
 * - read: any member (creator included); others get 404
 * - edit / membership management: creator or a member with role owner|admin
 * - role escalation (changing another member's role): owner-only
 * - delete: creator-only
 *
 * Deleting a project does NOT delete its tasks or meetings; they keep
 * living with `project_id` cleared.
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::notifications;
use crate::projects::db;
use crate::projects::types::{
    AddMemberRequest, ChangeRoleRequest, CreateProjectRequest, MemberRole, ProjectDto,
    UpdateProjectRequest,
};
use crate::response::Envelope;
use crate::server::state::AppState;
use crate::users;

async fn invalidate_project_listings(cache: &CacheService, members: &[Uuid]) {
    cache.delete_pattern(keys::PROJECTS_QUERY_PATTERN).await;
    for &user in members {
        cache.delete(&keys::user_projects(user)).await;
    }
}

/// Caller's role, or 404 when the project is invisible to them.
async fn require_role(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRole, ApiError> {
    db::member_role(&state.pool, project_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

/// Create a project; the caller becomes the implicit owner member.
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectDto>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("Project name is required"));
    }

    if let Some(team_id) = request.team_id {
        crate::teams::db::get_team(&state.pool, team_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Team not found"))?;
    }

    let project_id = db::insert_project(
        &state.pool,
        request.name.trim(),
        request.description.as_deref(),
        caller.user_id,
        request.team_id,
    )
    .await?;

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::internal("Project vanished after insert"))?;

    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;
    invalidate_project_listings(&state.cache, &[caller.user_id]).await;

    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectDto>,
}

/// List the caller's projects.
pub async fn list_projects(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let cache_key = keys::user_projects(caller.user_id);
    if let Some(projects) = state.cache.get_json::<Vec<ProjectDto>>(&cache_key).await {
        return Ok(Json(ProjectListResponse { projects }));
    }

    let projects = db::list_for_user(&state.pool, caller.user_id).await?;
    state
        .cache
        .set_json(&cache_key, &projects, keys::TTL_USER_LIST)
        .await;

    Ok(Json(ProjectListResponse { projects }))
}

/// Fetch one project (member-visible).
pub async fn get_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectDto>, ApiError> {
    require_role(&state, project_id, caller.user_id).await?;

    if let Some(cached) = state
        .cache
        .get_json::<ProjectDto>(&keys::project(project_id))
        .await
    {
        return Ok(Json(cached));
    }

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;

    Ok(Json(project))
}

/// Edit a project. Owner/admin only.
pub async fn update_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectDto>, ApiError> {
    let role = require_role(&state, project_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden(
            "Only owners and admins can edit this project",
        ));
    }

    if let Some(status) = request.status.as_deref() {
        if !matches!(status, "active" | "archived" | "completed") {
            return Err(ApiError::validation(
                "Invalid status; expected active|archived|completed",
            ));
        }
    }

    db::update_project(
        &state.pool,
        project_id,
        request.name.as_deref().map(str::trim),
        request.description.as_deref(),
        request.status.as_deref(),
    )
    .await?;

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let member_ids: Vec<Uuid> = project.members.iter().map(|m| m.user.id).collect();
    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;
    invalidate_project_listings(&state.cache, &member_ids).await;

    Ok(Json(project))
}

/// Delete a project. Creator-only. Tasks/meetings survive with their
/// project reference cleared.
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let creator = db::creator_of(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if creator != caller.user_id {
        return Err(ApiError::forbidden("Only the creator can delete a project"));
    }

    let member_ids: Vec<Uuid> = db::members(&state.pool, project_id)
        .await?
        .iter()
        .map(|m| m.user.id)
        .collect();

    db::delete_project(&state.pool, project_id).await?;

    state.cache.delete(&keys::project(project_id)).await;
    invalidate_project_listings(&state.cache, &member_ids).await;

    Ok(Json(Envelope::message_only("Project deleted")))
}

/// Add a member. Owner/admin only; assigning the owner role this way is
/// not allowed.
pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Json<ProjectDto>, ApiError> {
    let role = require_role(&state, project_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden(
            "Only owners and admins can add members",
        ));
    }

    let new_role = match request.role.as_deref() {
        Some(raw) => MemberRole::from_str(raw)
            .ok_or_else(|| ApiError::validation("Invalid role; expected admin|member"))?,
        None => MemberRole::Member,
    };
    if new_role == MemberRole::Owner {
        return Err(ApiError::validation("Members cannot be added as owner"));
    }

    users::db::get_summary(&state.pool, request.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let added = db::add_member(&state.pool, project_id, request.user_id, new_role).await?;
    if !added {
        return Err(ApiError::conflict("User is already a member"));
    }

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let member_ids: Vec<Uuid> = project.members.iter().map(|m| m.user.id).collect();
    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;
    invalidate_project_listings(&state.cache, &member_ids).await;

    notifications::db::create_notification(
        &state.pool,
        request.user_id,
        Some(caller.user_id),
        "project_member_added",
        &format!("{} added you to project {}", caller.username, project.name),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("member notification failed: {:?}", e));

    Ok(Json(project))
}

/// Remove a member. Owner/admin only; the creator cannot be removed.
pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ProjectDto>, ApiError> {
    let role = require_role(&state, project_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden(
            "Only owners and admins can remove members",
        ));
    }

    let creator = db::creator_of(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if user_id == creator {
        return Err(ApiError::validation("The project owner cannot be removed"));
    }

    let removed = db::remove_member(&state.pool, project_id, user_id).await?;
    if !removed {
        return Err(ApiError::not_found("User is not a member"));
    }

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let mut member_ids: Vec<Uuid> = project.members.iter().map(|m| m.user.id).collect();
    member_ids.push(user_id);
    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;
    invalidate_project_listings(&state.cache, &member_ids).await;

    Ok(Json(project))
}

/// Change a member's role. Owner-only, stricter than the admin gate.
pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<ProjectDto>, ApiError> {
    let role = require_role(&state, project_id, caller.user_id).await?;
    if role != MemberRole::Owner {
        return Err(ApiError::forbidden("Only the owner can change member roles"));
    }

    let new_role = MemberRole::from_str(&request.role)
        .ok_or_else(|| ApiError::validation("Invalid role; expected owner|admin|member"))?;

    let creator = db::creator_of(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if user_id == creator {
        return Err(ApiError::validation("The creator's role cannot be changed"));
    }

    let changed = db::set_member_role(&state.pool, project_id, user_id, new_role).await?;
    if !changed {
        return Err(ApiError::not_found("User is not a member"));
    }

    let project = db::get_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let member_ids: Vec<Uuid> = project.members.iter().map(|m| m.user.id).collect();
    state
        .cache
        .set_json(&keys::project(project_id), &project, keys::TTL_ENTITY)
        .await;
    invalidate_project_listings(&state.cache, &member_ids).await;

    Ok(Json(project))
}
