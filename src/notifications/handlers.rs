/**
 * Notification HTTP Handlers
 *
 * The list read is cached per user (1800 s); both read-marking operations
 * invalidate it.
 */

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::keys;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::notifications::db::{self, Notification};
use crate::response::{PageParams, Pagination};
use crate::server::state::AppState;

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread: i64,
    pub pagination: Pagination,
}

/// List the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let (page, limit) = params.resolve();

    // Only the default first page is cached; deeper pages are rare.
    let cache_key = keys::user_notifications(caller.user_id);
    let cacheable = page == 1 && limit == 20;
    if cacheable {
        if let Some(cached) = state
            .cache
            .get_json::<NotificationListResponse>(&cache_key)
            .await
        {
            return Ok(Json(cached));
        }
    }

    let notifications =
        db::list_for_user(&state.pool, caller.user_id, limit as i64, params.offset()).await?;
    let total = db::count_for_user(&state.pool, caller.user_id).await? as u64;
    let unread = db::count_unread(&state.pool, caller.user_id).await?;

    let response = NotificationListResponse {
        notifications,
        unread,
        pagination: Pagination::new(page, limit, total),
    };

    if cacheable {
        state
            .cache
            .set_json(&cache_key, &response, keys::TTL_USER_LIST)
            .await;
    }

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub updated: u64,
}

/// Mark one notification read (recipient-only).
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let updated = db::mark_read(&state.pool, notification_id, caller.user_id).await?;
    if !updated {
        return Err(ApiError::not_found("Notification not found"));
    }

    state
        .cache
        .delete(&keys::user_notifications(caller.user_id))
        .await;

    Ok(Json(MarkReadResponse {
        success: true,
        updated: 1,
    }))
}

/// Mark every unread notification of the caller read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let updated = db::mark_all_read(&state.pool, caller.user_id).await?;

    state
        .cache
        .delete(&keys::user_notifications(caller.user_id))
        .await;

    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}
