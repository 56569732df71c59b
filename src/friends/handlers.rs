/**
 * Friends HTTP Handlers
 *
 * Friend request lifecycle and the friend list. A request transitions
 * pending -> accepted (which creates the symmetric friendship) or
 * pending -> rejected. Only the recipient may respond.
 */

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::users::{get_user_by_id, get_user_by_username};
use crate::error::ApiError;
use crate::friends::db::{self, FriendRequest, FriendRequestStatus};
use crate::middleware::auth::AuthUser;
use crate::notifications;
use crate::server::state::AppState;
use crate::users::types::UserSummary;

#[derive(Debug, Deserialize)]
pub struct SendFriendRequestRequest {
    pub username: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendFriendRequestResponse {
    pub success: bool,
    pub request_id: Uuid,
}

/// Send a friend request by username.
pub async fn send_friend_request(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<SendFriendRequestRequest>,
) -> Result<Json<SendFriendRequestResponse>, ApiError> {
    let target = get_user_by_username(&state.pool, &request.username)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if target.id == caller.user_id {
        return Err(ApiError::validation(
            "You cannot send a friend request to yourself",
        ));
    }

    if db::are_friends(&state.pool, caller.user_id, target.id).await? {
        return Err(ApiError::conflict("Already friends"));
    }

    if db::has_pending_between(&state.pool, caller.user_id, target.id).await? {
        return Err(ApiError::conflict("Friend request already pending"));
    }

    let request_id = db::create_request(
        &state.pool,
        caller.user_id,
        target.id,
        request.message.as_deref(),
    )
    .await
    .map_err(|e| {
        // concurrent duplicate resolves via the partial unique index
        if e.to_string().contains("duplicate key") {
            ApiError::conflict("Friend request already pending")
        } else {
            ApiError::from(e)
        }
    })?;

    notifications::db::create_notification(
        &state.pool,
        target.id,
        Some(caller.user_id),
        "friend_request",
        &format!("{} sent you a friend request", caller.username),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("friend request notification failed: {:?}", e));

    state.mailer.send(
        &target.email,
        "New friend request",
        &format!("{} sent you a friend request on crewspace.", caller.username),
    );

    Ok(Json(SendFriendRequestResponse {
        success: true,
        request_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct ListFriendRequestsResponse {
    pub requests: Vec<FriendRequest>,
}

/// Pending friend requests addressed to the caller.
pub async fn list_friend_requests(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<ListFriendRequestsResponse>, ApiError> {
    let requests = db::pending_for_user(&state.pool, caller.user_id).await?;
    Ok(Json(ListFriendRequestsResponse { requests }))
}

#[derive(Debug, Deserialize)]
pub struct RespondFriendRequestRequest {
    pub request_id: Uuid,
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct RespondFriendRequestResponse {
    pub success: bool,
    pub status: FriendRequestStatus,
}

/// Accept or reject a pending friend request (recipient-only).
pub async fn respond_to_friend_request(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<RespondFriendRequestRequest>,
) -> Result<Json<RespondFriendRequestResponse>, ApiError> {
    let friend_request = db::get_request(&state.pool, request.request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;

    if friend_request.to_user_id != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the recipient can respond to a friend request",
        ));
    }

    if friend_request.status != FriendRequestStatus::Pending {
        return Err(ApiError::conflict("Friend request already answered"));
    }

    let status = if request.accept {
        db::set_request_status(&state.pool, request.request_id, FriendRequestStatus::Accepted)
            .await?;
        db::create_friendship(&state.pool, caller.user_id, friend_request.from_user.id).await?;

        notifications::db::create_notification(
            &state.pool,
            friend_request.from_user.id,
            Some(caller.user_id),
            "friend_accepted",
            &format!("{} accepted your friend request", caller.username),
        )
        .await
        .unwrap_or_else(|e| tracing::warn!("friend accepted notification failed: {:?}", e));

        FriendRequestStatus::Accepted
    } else {
        db::set_request_status(&state.pool, request.request_id, FriendRequestStatus::Rejected)
            .await?;
        FriendRequestStatus::Rejected
    };

    Ok(Json(RespondFriendRequestResponse {
        success: true,
        status,
    }))
}

#[derive(Debug, Serialize)]
pub struct FriendListResponse {
    pub friends: Vec<UserSummary>,
}

/// The caller's friends.
pub async fn list_friends(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<FriendListResponse>, ApiError> {
    let friends = db::list_friends(&state.pool, caller.user_id).await?;
    Ok(Json(FriendListResponse { friends }))
}

#[derive(Debug, Serialize)]
pub struct UnfriendResponse {
    pub success: bool,
}

/// Remove a friendship.
pub async fn unfriend(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UnfriendResponse>, ApiError> {
    get_user_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let removed = db::delete_friendship(&state.pool, caller.user_id, user_id).await?;
    if !removed {
        return Err(ApiError::not_found("You are not friends with this user"));
    }

    Ok(Json(UnfriendResponse { success: true }))
}
