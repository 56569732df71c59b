//! Team HTTP handlers. Same gates as projects: member-visible reads,
//! owner/admin management, owner-only role changes, creator-only delete.

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
use crate::projects::types::{AddMemberRequest, ChangeRoleRequest, MemberRole};
use crate::response::Envelope;
use crate::server::state::AppState;
use crate::teams::db;
use crate::teams::types::{CreateTeamRequest, TeamDto, UpdateTeamRequest};
use crate::users;

async fn invalidate_team_listings(cache: &CacheService, members: &[Uuid]) {
    cache.delete_pattern(keys::TEAMS_QUERY_PATTERN).await;
    for &user in members {
        cache.delete(&keys::user_teams(user)).await;
    }
}

async fn require_role(
    state: &AppState,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRole, ApiError> {
    db::member_role(&state.pool, team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

async fn refresh_team_cache(state: &AppState, team_id: Uuid) -> Result<TeamDto, ApiError> {
    let team = db::get_team(&state.pool, team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))?;
    state
        .cache
        .set_json(&keys::team(team_id), &team, keys::TTL_ENTITY)
        .await;
    Ok(team)
}

pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamDto>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("Team name is required"));
    }

    let team_id = db::insert_team(
        &state.pool,
        request.name.trim(),
        request.description.as_deref(),
        caller.user_id,
    )
    .await?;

    let team = refresh_team_cache(&state, team_id).await?;
    invalidate_team_listings(&state.cache, &[caller.user_id]).await;

    Ok((StatusCode::CREATED, Json(team)))
}

#[derive(Debug, Serialize)]
pub struct TeamListResponse {
    pub teams: Vec<TeamDto>,
}

pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<TeamListResponse>, ApiError> {
    let cache_key = keys::user_teams(caller.user_id);
    if let Some(teams) = state.cache.get_json::<Vec<TeamDto>>(&cache_key).await {
        return Ok(Json(TeamListResponse { teams }));
    }

    let teams = db::list_for_user(&state.pool, caller.user_id).await?;
    state
        .cache
        .set_json(&cache_key, &teams, keys::TTL_USER_LIST)
        .await;

    Ok(Json(TeamListResponse { teams }))
}

pub async fn get_team(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamDto>, ApiError> {
    require_role(&state, team_id, caller.user_id).await?;

    if let Some(cached) = state.cache.get_json::<TeamDto>(&keys::team(team_id)).await {
        return Ok(Json(cached));
    }

    let team = refresh_team_cache(&state, team_id).await?;
    Ok(Json(team))
}

pub async fn update_team(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<UpdateTeamRequest>,
) -> Result<Json<TeamDto>, ApiError> {
    let role = require_role(&state, team_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden(
            "Only owners and admins can edit this team",
        ));
    }

    db::update_team(
        &state.pool,
        team_id,
        request.name.as_deref().map(str::trim),
        request.description.as_deref(),
    )
    .await?;

    let team = refresh_team_cache(&state, team_id).await?;
    let member_ids: Vec<Uuid> = team.members.iter().map(|m| m.user.id).collect();
    invalidate_team_listings(&state.cache, &member_ids).await;

    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let creator = db::creator_of(&state.pool, team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))?;
    if creator != caller.user_id {
        return Err(ApiError::forbidden("Only the creator can delete a team"));
    }

    let member_ids: Vec<Uuid> = db::members(&state.pool, team_id)
        .await?
        .iter()
        .map(|m| m.user.id)
        .collect();

    db::delete_team(&state.pool, team_id).await?;

    state.cache.delete(&keys::team(team_id)).await;
    invalidate_team_listings(&state.cache, &member_ids).await;

    Ok(Json(Envelope::message_only("Team deleted")))
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Json<TeamDto>, ApiError> {
    let role = require_role(&state, team_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden("Only owners and admins can add members"));
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

    let added = db::add_member(&state.pool, team_id, request.user_id, new_role).await?;
    if !added {
        return Err(ApiError::conflict("User is already a member"));
    }

    let team = refresh_team_cache(&state, team_id).await?;
    let member_ids: Vec<Uuid> = team.members.iter().map(|m| m.user.id).collect();
    invalidate_team_listings(&state.cache, &member_ids).await;

    notifications::db::create_notification(
        &state.pool,
        request.user_id,
        Some(caller.user_id),
        "team_member_added",
        &format!("{} added you to team {}", caller.username, team.name),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("member notification failed: {:?}", e));

    Ok(Json(team))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TeamDto>, ApiError> {
    let role = require_role(&state, team_id, caller.user_id).await?;
    if !role.can_manage() {
        return Err(ApiError::forbidden(
            "Only owners and admins can remove members",
        ));
    }

    let creator = db::creator_of(&state.pool, team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))?;
    if user_id == creator {
        return Err(ApiError::validation("The team owner cannot be removed"));
    }

    let removed = db::remove_member(&state.pool, team_id, user_id).await?;
    if !removed {
        return Err(ApiError::not_found("User is not a member"));
    }

    let team = refresh_team_cache(&state, team_id).await?;
    let mut member_ids: Vec<Uuid> = team.members.iter().map(|m| m.user.id).collect();
    member_ids.push(user_id);
    invalidate_team_listings(&state.cache, &member_ids).await;

    Ok(Json(team))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<TeamDto>, ApiError> {
    let role = require_role(&state, team_id, caller.user_id).await?;
    if role != MemberRole::Owner {
        return Err(ApiError::forbidden("Only the owner can change member roles"));
    }

    let new_role = MemberRole::from_str(&request.role)
        .ok_or_else(|| ApiError::validation("Invalid role; expected owner|admin|member"))?;

    let creator = db::creator_of(&state.pool, team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))?;
    if user_id == creator {
        return Err(ApiError::validation("The creator's role cannot be changed"));
    }

    let changed = db::set_member_role(&state.pool, team_id, user_id, new_role).await?;
    if !changed {
        return Err(ApiError::not_found("User is not a member"));
    }

    let team = refresh_team_cache(&state, team_id).await?;
    let member_ids: Vec<Uuid> = team.members.iter().map(|m| m.user.id).collect();
    invalidate_team_listings(&state.cache, &member_ids).await;

    Ok(Json(team))
}
