/**
 * User HTTP Handlers
 *
 * Public search and profile reads, own-profile updates, and the follow
 * graph. Profile reads go through the per-user cache; anything that
 * changes what a profile view shows (profile edits, follow edges)
 * invalidates it.
 */

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::handlers::types::UserResponse;
use crate::cache::{keys, CacheService};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::notifications;
use crate::response::{PageParams, Pagination};
use crate::server::state::AppState;
use crate::users::db;
use crate::users::types::{PublicProfile, UpdateProfileRequest, UserSummary};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
    pub pagination: Pagination,
}

/// Public user search. No auth required.
pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::validation("Search query must not be empty"));
    }

    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.resolve();
    let users = db::search_users(&state.pool, query, limit as i64, page_params.offset()).await?;
    let total = db::count_search(&state.pool, query).await? as u64;

    Ok(Json(SearchResponse {
        users,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Public profile view, read through the cache.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicProfile>, ApiError> {
    let cache_key = keys::user_profile(user_id);
    if let Some(cached) = state.cache.get_json::<PublicProfile>(&cache_key).await {
        return Ok(Json(cached));
    }

    let profile = db::get_public_profile(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    state
        .cache
        .set_json(&cache_key, &profile, keys::TTL_ENTITY)
        .await;

    Ok(Json(profile))
}

/// Update the caller's own profile.
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(name) = request.display_name.as_deref() {
        if name.len() > 80 {
            return Err(ApiError::validation("Display name too long"));
        }
    }
    if let Some(bio) = request.bio.as_deref() {
        if bio.len() > 500 {
            return Err(ApiError::validation("Bio too long"));
        }
    }

    let user = crate::auth::users::update_profile(
        &state.pool,
        caller.user_id,
        request.display_name.as_deref(),
        request.bio.as_deref(),
        request.avatar_url.as_deref(),
    )
    .await?;

    state.cache.delete(&keys::user_profile(caller.user_id)).await;

    Ok(Json(UserResponse::from(user)))
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub success: bool,
    pub message: String,
}

/// Follow a user.
pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowResponse>, ApiError> {
    if user_id == caller.user_id {
        return Err(ApiError::validation("You cannot follow yourself"));
    }

    let target = db::get_summary(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let inserted = db::follow(&state.pool, caller.user_id, user_id).await?;
    if !inserted {
        return Err(ApiError::conflict("Already following this user"));
    }

    invalidate_profiles(&state.cache, caller.user_id, user_id).await;

    notifications::db::create_notification(
        &state.pool,
        user_id,
        Some(caller.user_id),
        "follow",
        &format!("{} started following you", caller.username),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("follow notification failed: {:?}", e));

    Ok(Json(FollowResponse {
        success: true,
        message: format!("You are now following {}", target.username),
    }))
}

/// Unfollow a user.
pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowResponse>, ApiError> {
    let removed = db::unfollow(&state.pool, caller.user_id, user_id).await?;
    if !removed {
        return Err(ApiError::not_found("You are not following this user"));
    }

    invalidate_profiles(&state.cache, caller.user_id, user_id).await;

    Ok(Json(FollowResponse {
        success: true,
        message: "Unfollowed".to_string(),
    }))
}

/// Follow edges change the counts on both profiles.
async fn invalidate_profiles(cache: &CacheService, a: Uuid, b: Uuid) {
    cache.delete(&keys::user_profile(a)).await;
    cache.delete(&keys::user_profile(b)).await;
}

#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub users: Vec<UserSummary>,
}

/// Users following the given user.
pub async fn list_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowListResponse>, ApiError> {
    db::get_summary(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let users = db::followers(&state.pool, user_id).await?;
    Ok(Json(FollowListResponse { users }))
}

/// Users the given user follows.
pub async fn list_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowListResponse>, ApiError> {
    db::get_summary(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let users = db::following(&state.pool, user_id).await?;
    Ok(Json(FollowListResponse { users }))
}
