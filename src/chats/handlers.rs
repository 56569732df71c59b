/**
 * Chat HTTP Handlers
 *
 * Chat creation (direct chats are idempotent by participant pair),
 * message send/edit/soft-delete, and read marking.
 *
 * # Fan-out contract
 *
 * After persistence and cache steps succeed, message mutations emit one
 * event to the chat room (`new_message`, `message_updated`,
 * `message_deleted`) and then recompute and emit a `chat_updated` summary
 * to each participant's personal room so client chat lists stay in sync
 * without a re-fetch. Realtime failures never fail the request.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{keys, CacheService};
use crate::chats::db;
use crate::chats::types::{
    ChatDto, ChatType, CreateChatRequest, EditMessageRequest, MessageDto, MessageListResponse,
    SendMessageRequest,
};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::realtime::events::{ServerEvent, ServerEventKind};
use crate::realtime::hub::{chat_room, user_room};
use crate::response::{PageParams, Pagination};
use crate::server::state::AppState;
use crate::users;

const MAX_MESSAGE_LEN: usize = 4000;

async fn invalidate_chat_caches(cache: &CacheService, chat_id: Uuid, participants: &[Uuid]) {
    cache.delete_pattern(&keys::chat_messages_pattern(chat_id)).await;
    for &user in participants {
        cache.delete(&keys::user_chats(user)).await;
    }
}

/// Recompute each participant's chat summary and push it to their
/// personal room.
async fn emit_chat_summaries(state: &AppState, chat_id: Uuid, participants: &[Uuid]) {
    for &user in participants {
        match db::get_chat_for_user(&state.pool, chat_id, user).await {
            Ok(Some(summary)) => {
                let payload = match serde_json::to_value(&summary) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("chat summary serialization failed: {:?}", e);
                        continue;
                    }
                };
                state.realtime.emit_to_room(
                    &user_room(user),
                    ServerEvent::new(ServerEventKind::ChatUpdated, payload),
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("chat summary recompute failed: {:?}", e),
        }
    }
}

/// Create a chat. Direct chats take exactly one other participant and are
/// idempotent: creating the same pair twice returns the existing chat.
pub async fn create_chat(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatDto>), ApiError> {
    let chat_type = ChatType::from_str(&request.chat_type)
        .ok_or_else(|| ApiError::validation("Invalid chat type; expected direct|group"))?;

    let mut others: Vec<Uuid> = request
        .participants
        .iter()
        .copied()
        .filter(|&id| id != caller.user_id)
        .collect();
    others.sort();
    others.dedup();

    for &user_id in &others {
        users::db::get_summary(&state.pool, user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Participant not found"))?;
    }

    let chat_id = match chat_type {
        ChatType::Direct => {
            if others.len() != 1 {
                return Err(ApiError::validation(
                    "Direct chats require exactly one other participant",
                ));
            }
            if let Some(existing) = db::find_direct_chat(&state.pool, caller.user_id, others[0]).await? {
                let chat = db::get_chat_for_user(&state.pool, existing, caller.user_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Chat not found"))?;
                return Ok((StatusCode::OK, Json(chat)));
            }
            let members = [caller.user_id, others[0]];
            db::create_chat(&state.pool, chat_type, None, caller.user_id, &members).await?
        }
        ChatType::Group => {
            if others.len() < 2 {
                return Err(ApiError::validation(
                    "Group chats require at least two other participants",
                ));
            }
            let name = request
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ApiError::validation("Group chats require a name"))?;
            let mut members = others.clone();
            members.push(caller.user_id);
            db::create_chat(&state.pool, chat_type, Some(name), caller.user_id, &members).await?
        }
    };

    let chat = db::get_chat_for_user(&state.pool, chat_id, caller.user_id)
        .await?
        .ok_or_else(|| ApiError::internal("Chat vanished after insert"))?;

    let participant_ids: Vec<Uuid> = chat.participants.iter().map(|p| p.id).collect();
    invalidate_chat_caches(&state.cache, chat_id, &participant_ids).await;

    Ok((StatusCode::CREATED, Json(chat)))
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatDto>,
}

/// The caller's chats with previews and unread counts.
pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<ChatListResponse>, ApiError> {
    let cache_key = keys::user_chats(caller.user_id);
    if let Some(chats) = state.cache.get_json::<Vec<ChatDto>>(&cache_key).await {
        return Ok(Json(ChatListResponse { chats }));
    }

    let chats = db::list_chats_for_user(&state.pool, caller.user_id).await?;
    state
        .cache
        .set_json(&cache_key, &chats, keys::TTL_USER_LIST)
        .await;

    Ok(Json(ChatListResponse { chats }))
}

/// Page through a chat's messages. Participants only; everyone else gets
/// a 404 rather than confirmation the chat exists.
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(chat_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Json<MessageListResponse>, ApiError> {
    if !db::is_participant(&state.pool, chat_id, caller.user_id).await? {
        return Err(ApiError::not_found("Chat not found"));
    }

    let (page, limit) = params.resolve();
    let cache_key = keys::chat_messages_page(chat_id, page, limit);
    if let Some(cached) = state.cache.get_json::<MessageListResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let messages = db::list_messages(&state.pool, chat_id, limit as i64, params.offset()).await?;
    let total = db::count_messages(&state.pool, chat_id).await? as u64;

    let response = MessageListResponse {
        messages,
        pagination: Pagination::new(page, limit, total),
    };

    state
        .cache
        .set_json(&cache_key, &response, keys::TTL_QUERY)
        .await;

    Ok(Json(response))
}

/// Send a message. Participants only.
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(chat_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message content must not be empty"));
    }
    if content.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation("Message content too long"));
    }

    if !db::is_participant(&state.pool, chat_id, caller.user_id).await? {
        return Err(ApiError::not_found("Chat not found"));
    }

    let message_id = db::insert_message(&state.pool, chat_id, caller.user_id, content).await?;
    let message = db::get_message(&state.pool, message_id)
        .await?
        .ok_or_else(|| ApiError::internal("Message vanished after insert"))?;

    let participants = db::participant_ids(&state.pool, chat_id).await?;
    invalidate_chat_caches(&state.cache, chat_id, &participants).await;

    let payload = serde_json::to_value(&message)
        .map_err(|e| ApiError::internal(format!("Message serialization failed: {e}")))?;
    state
        .realtime
        .emit_to_room(&chat_room(chat_id), ServerEvent::new(ServerEventKind::NewMessage, payload));
    emit_chat_summaries(&state, chat_id, &participants).await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Edit a message. Sender-only; deleted messages cannot be edited.
pub async fn edit_message(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<MessageDto>, ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message content must not be empty"));
    }
    if content.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation("Message content too long"));
    }

    let meta = db::get_message_meta(&state.pool, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    if meta.sender_id != caller.user_id {
        return Err(ApiError::forbidden("Only the sender can edit a message"));
    }
    if meta.is_deleted {
        return Err(ApiError::conflict("Deleted messages cannot be edited"));
    }

    db::edit_message(&state.pool, message_id, content).await?;
    let message = db::get_message(&state.pool, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;

    let participants = db::participant_ids(&state.pool, meta.chat_id).await?;
    invalidate_chat_caches(&state.cache, meta.chat_id, &participants).await;

    let payload = serde_json::to_value(&message)
        .map_err(|e| ApiError::internal(format!("Message serialization failed: {e}")))?;
    state.realtime.emit_to_room(
        &chat_room(meta.chat_id),
        ServerEvent::new(ServerEventKind::MessageUpdated, payload),
    );
    emit_chat_summaries(&state, meta.chat_id, &participants).await;

    Ok(Json(message))
}

/// Soft-delete a message. Sender-only; the row survives with redacted
/// content and `is_deleted` set.
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let meta = db::get_message_meta(&state.pool, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    if meta.sender_id != caller.user_id {
        return Err(ApiError::forbidden("Only the sender can delete a message"));
    }
    if meta.is_deleted {
        return Err(ApiError::conflict("Message is already deleted"));
    }

    db::soft_delete_message(&state.pool, message_id).await?;

    let participants = db::participant_ids(&state.pool, meta.chat_id).await?;
    invalidate_chat_caches(&state.cache, meta.chat_id, &participants).await;

    state.realtime.emit_to_room(
        &chat_room(meta.chat_id),
        ServerEvent::new(
            ServerEventKind::MessageDeleted,
            serde_json::json!({ "chat_id": meta.chat_id, "message_id": message_id }),
        ),
    );
    emit_chat_summaries(&state, meta.chat_id, &participants).await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Message deleted",
    })))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub marked: u64,
}

/// Mark every message in the chat read for the caller.
pub async fn mark_chat_read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    if !db::is_participant(&state.pool, chat_id, caller.user_id).await? {
        return Err(ApiError::not_found("Chat not found"));
    }

    let marked = db::mark_chat_read(&state.pool, chat_id, caller.user_id).await?;

    state.cache.delete(&keys::user_chats(caller.user_id)).await;
    state
        .cache
        .delete_pattern(&keys::chat_messages_pattern(chat_id))
        .await;

    state.realtime.emit_to_room(
        &chat_room(chat_id),
        ServerEvent::message_read(chat_id, caller.user_id),
    );

    Ok(Json(MarkReadResponse {
        success: true,
        marked,
    }))
}
