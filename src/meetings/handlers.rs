/**
 * Meeting HTTP Handlers
 *
 * Same ownership contract as tasks: the scheduler (assigner) may edit,
 * reschedule, delete, and manage the roster; only the primary attendee
 * may change status. Cache fan-out mirrors the task convention.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::error::ApiError;
use crate::meetings::db::{self, MeetingOwners};
use crate::meetings::types::{
    AddAttendeeRequest, CreateMeetingRequest, MeetingDto, MeetingListResponse, MeetingStatus,
    UpdateMeetingRequest, UpdateMeetingStatusRequest,
};
use crate::middleware::auth::AuthUser;
use crate::notifications;
use crate::response::{Envelope, PageParams, Pagination};
use crate::server::state::AppState;
use crate::users;

async fn invalidate_meeting_listings(cache: &CacheService, parties: &[Uuid]) {
    cache.delete_pattern(keys::MEETINGS_QUERY_PATTERN).await;
    for &user in parties {
        cache.delete(&keys::user_meetings(user)).await;
    }
}

async fn load_owners(state: &AppState, meeting_id: Uuid) -> Result<MeetingOwners, ApiError> {
    db::get_owners(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))
}

/// Schedule a meeting; the caller becomes the scheduler.
pub async fn create_meeting(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<MeetingDto>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("Meeting title is required"));
    }
    let duration = request.duration_minutes.unwrap_or(30);
    if !(5..=480).contains(&duration) {
        return Err(ApiError::validation(
            "Meeting duration must be between 5 and 480 minutes",
        ));
    }

    let attendee = users::db::get_summary(&state.pool, request.assigned_to)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendee not found"))?;

    if let Some(project_id) = request.project_id {
        crate::projects::db::get_project(&state.pool, project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project not found"))?;
    }

    let meeting_id = db::insert_meeting(
        &state.pool,
        request.title.trim(),
        request.agenda.as_deref(),
        caller.user_id,
        request.assigned_to,
        request.project_id,
        request.starts_at,
        duration,
    )
    .await?;

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::internal("Meeting vanished after insert"))?;

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;
    invalidate_meeting_listings(&state.cache, &[caller.user_id, request.assigned_to]).await;

    notifications::db::create_notification(
        &state.pool,
        attendee.id,
        Some(caller.user_id),
        "meeting_scheduled",
        &format!(
            "{} scheduled a meeting with you: {}",
            caller.username, meeting.title
        ),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("meeting notification failed: {:?}", e));

    if let Ok(Some(user)) = crate::auth::users::get_user_by_id(&state.pool, attendee.id).await {
        state.mailer.send(
            &user.email,
            &format!("Meeting invitation: {}", meeting.title),
            &format!(
                "{} scheduled a meeting with you on {}.",
                caller.username, meeting.starts_at
            ),
        );
    }

    Ok((StatusCode::CREATED, Json(meeting)))
}

#[derive(Debug, Deserialize)]
pub struct ListMeetingsParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// List the caller's meetings, soonest first.
pub async fn list_meetings(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<ListMeetingsParams>,
) -> Result<Json<MeetingListResponse>, ApiError> {
    if let Some(status) = params.status.as_deref() {
        if MeetingStatus::from_str(status).is_none() {
            return Err(ApiError::validation(
                "Invalid status filter; expected scheduled|in_progress|completed|cancelled",
            ));
        }
    }

    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.resolve();
    let unfiltered = params.status.is_none() && page == 1 && limit == 20;
    let cache_key = if unfiltered {
        keys::user_meetings(caller.user_id)
    } else {
        let serialized = serde_json::to_string(&(&params.status, page, limit))
            .unwrap_or_else(|_| "unserializable".to_string());
        keys::meetings_query(caller.user_id, &serialized)
    };
    let ttl = if unfiltered {
        keys::TTL_USER_LIST
    } else {
        keys::TTL_QUERY
    };

    if let Some(cached) = state.cache.get_json::<MeetingListResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let meetings = db::list_meetings(
        &state.pool,
        caller.user_id,
        params.status.as_deref(),
        limit as i64,
        page_params.offset(),
    )
    .await?;
    let total = db::count_meetings(&state.pool, caller.user_id, params.status.as_deref()).await? as u64;

    let response = MeetingListResponse {
        meetings,
        pagination: Pagination::new(page, limit, total),
    };

    state.cache.set_json(&cache_key, &response, ttl).await;

    Ok(Json(response))
}

/// Fetch one meeting; scheduler, primary attendee, and roster members
/// have visibility, everyone else sees a 404.
pub async fn get_meeting(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingDto>, ApiError> {
    if let Some(cached) = state
        .cache
        .get_json::<MeetingDto>(&keys::meeting(meeting_id))
        .await
    {
        if cached.is_visible_to(caller.user_id) {
            return Ok(Json(cached));
        }
        return Err(ApiError::not_found("Meeting not found"));
    }

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    if !meeting.is_visible_to(caller.user_id) {
        return Err(ApiError::not_found("Meeting not found"));
    }

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;

    Ok(Json(meeting))
}

/// Edit or reschedule. Scheduler-only.
pub async fn update_meeting(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<UpdateMeetingRequest>,
) -> Result<Json<MeetingDto>, ApiError> {
    let owners = load_owners(&state, meeting_id).await?;
    if owners.scheduled_by != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the scheduler can edit this meeting",
        ));
    }

    if let Some(duration) = request.duration_minutes {
        if !(5..=480).contains(&duration) {
            return Err(ApiError::validation(
                "Meeting duration must be between 5 and 480 minutes",
            ));
        }
    }

    db::update_meeting(
        &state.pool,
        meeting_id,
        request.title.as_deref().map(str::trim),
        request.agenda.as_deref(),
        request.starts_at,
        request.duration_minutes,
    )
    .await?;

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;
    invalidate_meeting_listings(&state.cache, &[owners.scheduled_by, owners.assigned_to]).await;

    Ok(Json(meeting))
}

/// Transition meeting status. Primary-attendee-only.
pub async fn update_meeting_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<UpdateMeetingStatusRequest>,
) -> Result<Json<MeetingDto>, ApiError> {
    let status = MeetingStatus::from_str(&request.status).ok_or_else(|| {
        ApiError::validation("Invalid status; expected scheduled|in_progress|completed|cancelled")
    })?;

    let owners = load_owners(&state, meeting_id).await?;
    if owners.assigned_to != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the primary attendee can change meeting status",
        ));
    }

    db::update_status(&state.pool, meeting_id, status).await?;

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;
    invalidate_meeting_listings(&state.cache, &[owners.scheduled_by, owners.assigned_to]).await;

    Ok(Json(meeting))
}

/// Delete a meeting. Scheduler-only.
pub async fn delete_meeting(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let owners = load_owners(&state, meeting_id).await?;
    if owners.scheduled_by != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the scheduler can delete this meeting",
        ));
    }

    db::delete_meeting(&state.pool, meeting_id).await?;

    state.cache.delete(&keys::meeting(meeting_id)).await;
    invalidate_meeting_listings(&state.cache, &[owners.scheduled_by, owners.assigned_to]).await;

    Ok(Json(Envelope::message_only("Meeting deleted")))
}

/// Add a user to the roster. Scheduler-only.
pub async fn add_attendee(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<AddAttendeeRequest>,
) -> Result<Json<MeetingDto>, ApiError> {
    let owners = load_owners(&state, meeting_id).await?;
    if owners.scheduled_by != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the scheduler can manage attendees",
        ));
    }

    users::db::get_summary(&state.pool, request.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let added = db::add_attendee(&state.pool, meeting_id, request.user_id).await?;
    if !added {
        return Err(ApiError::conflict("User is already an attendee"));
    }

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;
    invalidate_meeting_listings(
        &state.cache,
        &[owners.scheduled_by, owners.assigned_to, request.user_id],
    )
    .await;

    notifications::db::create_notification(
        &state.pool,
        request.user_id,
        Some(caller.user_id),
        "meeting_invited",
        &format!("{} added you to a meeting: {}", caller.username, meeting.title),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("attendee notification failed: {:?}", e));

    Ok(Json(meeting))
}

/// Remove a user from the roster. Scheduler-only; the primary attendee
/// cannot be removed.
pub async fn remove_attendee(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((meeting_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MeetingDto>, ApiError> {
    let owners = load_owners(&state, meeting_id).await?;
    if owners.scheduled_by != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the scheduler can manage attendees",
        ));
    }
    if user_id == owners.assigned_to {
        return Err(ApiError::validation(
            "The primary attendee cannot be removed",
        ));
    }

    let removed = db::remove_attendee(&state.pool, meeting_id, user_id).await?;
    if !removed {
        return Err(ApiError::not_found("User is not an attendee"));
    }

    let meeting = db::get_meeting(&state.pool, meeting_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    state
        .cache
        .set_json(&keys::meeting(meeting_id), &meeting, keys::TTL_ENTITY)
        .await;
    invalidate_meeting_listings(
        &state.cache,
        &[owners.scheduled_by, owners.assigned_to, user_id],
    )
    .await;

    Ok(Json(meeting))
}
