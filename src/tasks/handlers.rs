/**
 * Task HTTP Handlers
 *
 * The ownership contract, enforced against the current persisted row on
 * every mutation:
 *
 * - Assigner-only: update, reassign, delete
 * - Assignee-only: status transitions
 *
 * Anyone who is neither party gets a 404 on reads (no visibility) and a
 * 403 on mutations, with state untouched.
 *
 * # Cache discipline
 *
 * Write order is fixed: persist -> re-fetch the populated DTO ->
 * write-through `task:<id>` -> pattern-invalidate every listing, per-user
 * list, and stats key that could reference either side of the change.
 * Reassignment invalidates the old AND the new assignee.
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
use crate::middleware::auth::AuthUser;
use crate::notifications;
use crate::response::{Envelope, PageParams, Pagination};
use crate::server::state::AppState;
use crate::tasks::db::{self, TaskOwners};
use crate::tasks::types::{
    CreateTaskRequest, ReassignRequest, TaskDto, TaskFilters, TaskListResponse, TaskPriority,
    TaskStats, TaskStatus, UpdateStatusRequest, UpdateTaskRequest,
};
use crate::users;

/// Clear every listing, per-user list, and stats entry that might hold a
/// stale view of this task for the given users. The per-id key is NOT
/// touched here: writes refresh it via write-through, and only deletion
/// removes it. Best-effort: failures are logged inside the cache.
async fn invalidate_task_listings(cache: &CacheService, parties: &[Uuid]) {
    cache.delete_pattern(keys::TASKS_QUERY_PATTERN).await;
    for &user in parties {
        cache.delete(&keys::user_tasks(user)).await;
        cache.delete(&keys::user_task_stats(user)).await;
    }
}

async fn load_owners(state: &AppState, task_id: Uuid) -> Result<TaskOwners, ApiError> {
    db::get_owners(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Create a task; the caller becomes the assigner.
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskDto>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("Task title is required"));
    }

    let priority = match request.priority.as_deref() {
        Some(raw) => TaskPriority::from_str(raw)
            .ok_or_else(|| ApiError::validation("Invalid priority; expected low|medium|high"))?,
        None => TaskPriority::Medium,
    };

    let assignee = users::db::get_summary(&state.pool, request.assigned_to)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignee not found"))?;

    if let Some(project_id) = request.project_id {
        crate::projects::db::get_project(&state.pool, project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project not found"))?;
    }

    let task_id = db::insert_task(
        &state.pool,
        request.title.trim(),
        request.description.as_deref(),
        caller.user_id,
        request.assigned_to,
        request.project_id,
        priority,
        request.due_date,
    )
    .await?;

    let task = db::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::internal("Task vanished after insert"))?;

    state
        .cache
        .set_json(&keys::task(task_id), &task, keys::TTL_ENTITY)
        .await;
    invalidate_task_listings(&state.cache, &[caller.user_id, request.assigned_to]).await;

    notifications::db::create_notification(
        &state.pool,
        assignee.id,
        Some(caller.user_id),
        "task_assigned",
        &format!("{} assigned you a task: {}", caller.username, task.title),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("task notification failed: {:?}", e));

    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
    pub project_id: Option<Uuid>,
    pub role: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// List the caller's tasks (either side of the assignment), filtered and
/// paginated. Unfiltered first pages use the per-user list key; filtered
/// queries use the serialized-filter key family.
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<TaskListResponse>, ApiError> {
    if let Some(status) = params.status.as_deref() {
        if TaskStatus::from_str(status).is_none() {
            return Err(ApiError::validation(
                "Invalid status filter; expected pending|in_progress|completed|cancelled",
            ));
        }
    }

    let filters = TaskFilters {
        status: params.status.clone(),
        project_id: params.project_id,
        role: params.role.clone(),
    };
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.resolve();

    let cache_key = if filters.is_empty() && page == 1 && limit == 20 {
        keys::user_tasks(caller.user_id)
    } else {
        let serialized = serde_json::to_string(&(&filters, page, limit))
            .unwrap_or_else(|_| "unserializable".to_string());
        keys::tasks_query(caller.user_id, &serialized)
    };
    let ttl = if filters.is_empty() {
        keys::TTL_USER_LIST
    } else {
        keys::TTL_QUERY
    };

    if let Some(cached) = state.cache.get_json::<TaskListResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let tasks = db::list_tasks(
        &state.pool,
        caller.user_id,
        &filters,
        limit as i64,
        page_params.offset(),
    )
    .await?;
    let total = db::count_tasks(&state.pool, caller.user_id, &filters).await? as u64;

    let response = TaskListResponse {
        tasks,
        pagination: Pagination::new(page, limit, total),
    };

    state.cache.set_json(&cache_key, &response, ttl).await;

    Ok(Json(response))
}

/// Fetch one task. Only the assigner and the assignee have visibility;
/// everyone else sees a 404.
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskDto>, ApiError> {
    if let Some(cached) = state.cache.get_json::<TaskDto>(&keys::task(task_id)).await {
        if cached.assigned_by.id == caller.user_id || cached.assigned_to.id == caller.user_id {
            return Ok(Json(cached));
        }
        return Err(ApiError::not_found("Task not found"));
    }

    let task = db::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    if task.assigned_by.id != caller.user_id && task.assigned_to.id != caller.user_id {
        return Err(ApiError::not_found("Task not found"));
    }

    state
        .cache
        .set_json(&keys::task(task_id), &task, keys::TTL_ENTITY)
        .await;

    Ok(Json(task))
}

/// Edit task fields. Assigner-only.
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    let owners = load_owners(&state, task_id).await?;
    if owners.assigned_by != caller.user_id {
        return Err(ApiError::forbidden("Only the assigner can edit this task"));
    }

    if let Some(title) = request.title.as_deref() {
        if title.trim().is_empty() {
            return Err(ApiError::validation("Task title must not be empty"));
        }
    }
    let priority = match request.priority.as_deref() {
        Some(raw) => Some(
            TaskPriority::from_str(raw)
                .ok_or_else(|| ApiError::validation("Invalid priority; expected low|medium|high"))?,
        ),
        None => None,
    };

    db::update_task(
        &state.pool,
        task_id,
        request.title.as_deref().map(str::trim),
        request.description.as_deref(),
        priority,
        request.due_date,
    )
    .await?;

    let task = db::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    state
        .cache
        .set_json(&keys::task(task_id), &task, keys::TTL_ENTITY)
        .await;
    invalidate_task_listings(&state.cache, &[owners.assigned_by, owners.assigned_to]).await;

    Ok(Json(task))
}

/// Transition task status. Assignee-only.
pub async fn update_task_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    let status = TaskStatus::from_str(&request.status).ok_or_else(|| {
        ApiError::validation("Invalid status; expected pending|in_progress|completed|cancelled")
    })?;

    let owners = load_owners(&state, task_id).await?;
    if owners.assigned_to != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the assignee can change task status",
        ));
    }

    db::update_status(&state.pool, task_id, status).await?;

    let task = db::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    state
        .cache
        .set_json(&keys::task(task_id), &task, keys::TTL_ENTITY)
        .await;
    invalidate_task_listings(&state.cache, &[owners.assigned_by, owners.assigned_to]).await;

    notifications::db::create_notification(
        &state.pool,
        owners.assigned_by,
        Some(caller.user_id),
        "task_status",
        &format!(
            "{} moved \"{}\" to {}",
            caller.username,
            task.title,
            status.as_str()
        ),
    )
    .await
    .unwrap_or_else(|e| tracing::warn!("status notification failed: {:?}", e));

    Ok(Json(task))
}

/// Reassign the task to another user. Assigner-only; both the old and
/// the new assignee's cached lists are invalidated.
pub async fn reassign_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(request): Json<ReassignRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    let owners = load_owners(&state, task_id).await?;
    if owners.assigned_by != caller.user_id {
        return Err(ApiError::forbidden(
            "Only the assigner can reassign this task",
        ));
    }

    let new_assignee = users::db::get_summary(&state.pool, request.assigned_to)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignee not found"))?;

    let old_assignee = owners.assigned_to;
    db::reassign(&state.pool, task_id, request.assigned_to).await?;

    let task = db::get_task(&state.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    state
        .cache
        .set_json(&keys::task(task_id), &task, keys::TTL_ENTITY)
        .await;
    invalidate_task_listings(
        &state.cache,
        &[caller.user_id, old_assignee, request.assigned_to],
    )
    .await;

    if new_assignee.id != old_assignee {
        notifications::db::create_notification(
            &state.pool,
            new_assignee.id,
            Some(caller.user_id),
            "task_assigned",
            &format!("{} assigned you a task: {}", caller.username, task.title),
        )
        .await
        .unwrap_or_else(|e| tracing::warn!("reassign notification failed: {:?}", e));
    }

    Ok(Json(task))
}

/// Delete a task. Assigner-only.
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let owners = load_owners(&state, task_id).await?;
    if owners.assigned_by != caller.user_id {
        return Err(ApiError::forbidden("Only the assigner can delete this task"));
    }

    db::delete_task(&state.pool, task_id).await?;
    invalidate_task_listings(&state.cache, &[owners.assigned_by, owners.assigned_to]).await;

    Ok(Json(Envelope::message_only("Task deleted")))
}

/// Per-caller dashboard counts, cached for 900 s.
pub async fn get_task_stats(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<TaskStats>, ApiError> {
    let cache_key = keys::user_task_stats(caller.user_id);
    if let Some(cached) = state.cache.get_json::<TaskStats>(&cache_key).await {
        return Ok(Json(cached));
    }

    let stats = db::stats_for_user(&state.pool, caller.user_id).await?;
    state.cache.set_json(&cache_key, &stats, keys::TTL_STATS).await;

    Ok(Json(stats))
}
