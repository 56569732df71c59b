/**
 * Code Session HTTP Handlers
 *
 * Session lifecycle, the invite-code join flow, and the explicit code
 * save. The realtime channel relays keystroke-level `code_change` events
 * without persistence; only the save endpoint here writes the blob, and
 * concurrent saves are last-writer-wins with no merge.
 *
 * # Invite flow
 *
 * (owner generates code) -> anyone with the code joins and lands on the
 * `invited_users` list -> the code never expires or rotates on its own;
 * regenerating overwrites it. Join is rejected only for inactive
 * sessions, private sessions the caller was never invited to, or a full
 * roster.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::keys;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::realtime::events::{ServerEvent, ServerEventKind};
use crate::realtime::hub::session_room;
use crate::response::{PageParams, Pagination};
use crate::server::state::AppState;
use crate::sessions::db::{self, SessionMeta};
use crate::sessions::types::{
    CodeSessionDto, CreateSessionRequest, SessionListResponse, UpdateCodeRequest,
    DEFAULT_MAX_PARTICIPANTS, MAX_PARTICIPANTS, MIN_PARTICIPANTS,
};

const INVITE_CODE_LEN: usize = 8;

fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Hide the invite code from everyone but the owner.
fn redact_for(mut session: CodeSessionDto, caller: Uuid) -> CodeSessionDto {
    if session.owner.id != caller {
        session.invite_code = None;
    }
    session
}

async fn load_meta(state: &AppState, session_id: Uuid) -> Result<SessionMeta, ApiError> {
    db::get_meta(&state.pool, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

/// Refresh the per-id cache after a mutation (write-through with the
/// unredacted DTO; redaction happens per response).
async fn refresh_session_cache(state: &AppState, session_id: Uuid) -> Result<CodeSessionDto, ApiError> {
    let session = db::get_session(&state.pool, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    state
        .cache
        .set_json(&keys::code_session(session_id), &session, keys::TTL_ENTITY)
        .await;
    state
        .cache
        .delete_pattern(keys::CODE_SESSIONS_QUERY_PATTERN)
        .await;
    Ok(session)
}

/// Create a session; the owner is the first participant.
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CodeSessionDto>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("Session title is required"));
    }

    let max_participants = request.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
    if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&max_participants) {
        return Err(ApiError::validation(format!(
            "max_participants must be between {MIN_PARTICIPANTS} and {MAX_PARTICIPANTS}"
        )));
    }

    let session_id = db::insert_session(
        &state.pool,
        caller.user_id,
        request.title.trim(),
        request.language.as_deref().unwrap_or("plaintext"),
        max_participants,
        request.is_public.unwrap_or(false),
    )
    .await?;

    let session = refresh_session_cache(&state, session_id).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Public session browser. No auth required.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let (page, limit) = params.resolve();
    let cache_key = keys::code_sessions_query(&format!("public:{page}:{limit}"));

    if let Some(cached) = state.cache.get_json::<SessionListResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let sessions = db::list_public(&state.pool, limit as i64, params.offset()).await?;
    let total = db::count_public(&state.pool).await? as u64;

    let response = SessionListResponse {
        sessions,
        pagination: Pagination::new(page, limit, total),
    };

    state
        .cache
        .set_json(&cache_key, &response, keys::TTL_QUERY)
        .await;

    Ok(Json(response))
}

/// Fetch one session; owner, participants, invitees, or anyone when
/// public.
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CodeSessionDto>, ApiError> {
    if let Some(cached) = state
        .cache
        .get_json::<CodeSessionDto>(&keys::code_session(session_id))
        .await
    {
        if cached.is_visible_to(caller.user_id) {
            return Ok(Json(redact_for(cached, caller.user_id)));
        }
        return Err(ApiError::not_found("Session not found"));
    }

    let session = db::get_session(&state.pool, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if !session.is_visible_to(caller.user_id) {
        return Err(ApiError::not_found("Session not found"));
    }

    state
        .cache
        .set_json(&keys::code_session(session_id), &session, keys::TTL_ENTITY)
        .await;

    Ok(Json(redact_for(session, caller.user_id)))
}

/// Join by session id. Open to the owner, invitees, prior participants,
/// and anyone on public sessions; rejected when inactive or full.
pub async fn join_session(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CodeSessionDto>, ApiError> {
    let meta = load_meta(&state, session_id).await?;

    if !meta.is_active {
        return Err(ApiError::conflict("Session has ended"));
    }

    if db::is_session_participant(&state.pool, session_id, caller.user_id).await? {
        // re-join is a no-op
        let session = db::get_session(&state.pool, session_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Session not found"))?;
        return Ok(Json(redact_for(session, caller.user_id)));
    }

    let allowed = meta.is_public
        || meta.owner_id == caller.user_id
        || db::is_invited(&state.pool, session_id, caller.user_id).await?;
    if !allowed {
        return Err(ApiError::forbidden("This session is private"));
    }

    let joined = db::add_participant_checked(&state.pool, session_id, caller.user_id).await?;
    if !joined {
        return Err(ApiError::conflict("Session is full"));
    }

    let session = refresh_session_cache(&state, session_id).await?;

    state.realtime.emit_to_room(
        &session_room(session_id),
        ServerEvent::user_joined_session(session_id, caller.user_id),
    );

    Ok(Json(redact_for(session, caller.user_id)))
}

/// Leave a session.
pub async fn leave_session(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_meta(&state, session_id).await?;

    let removed = db::remove_participant(&state.pool, session_id, caller.user_id).await?;
    if !removed {
        return Err(ApiError::not_found("You are not in this session"));
    }

    refresh_session_cache(&state, session_id).await?;

    state.realtime.emit_to_room(
        &session_room(session_id),
        ServerEvent::user_left_session(session_id, caller.user_id),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Left session",
    })))
}

#[derive(Debug, Serialize)]
pub struct InviteCodeResponse {
    pub invite_code: String,
}

/// Generate (or regenerate) the invite code. Owner-only; the new code
/// overwrites the old one.
pub async fn generate_invite(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<InviteCodeResponse>, ApiError> {
    let meta = load_meta(&state, session_id).await?;
    if meta.owner_id != caller.user_id {
        return Err(ApiError::forbidden("Only the owner can generate invites"));
    }

    // retry on the (unlikely) collision with another session's code
    let mut last_err = None;
    for _ in 0..3 {
        let code = generate_invite_code();
        match db::set_invite_code(&state.pool, session_id, &code).await {
            Ok(()) => {
                refresh_session_cache(&state, session_id).await?;
                return Ok(Json(InviteCodeResponse { invite_code: code }));
            }
            Err(e) if e.to_string().contains("duplicate key") => {
                last_err = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::internal(format!(
        "Could not allocate an invite code: {:?}",
        last_err
    )))
}

/// Join with an invite code. The cap is still enforced; the joiner is
/// recorded on the invited list.
pub async fn join_by_code(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(code): Path<String>,
) -> Result<Json<CodeSessionDto>, ApiError> {
    let session_id = db::find_by_invite_code(&state.pool, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Invalid invite code"))?;

    let meta = load_meta(&state, session_id).await?;
    if !meta.is_active {
        return Err(ApiError::conflict("Session has ended"));
    }

    db::add_invited_user(&state.pool, session_id, caller.user_id).await?;

    if !db::is_session_participant(&state.pool, session_id, caller.user_id).await? {
        let joined = db::add_participant_checked(&state.pool, session_id, caller.user_id).await?;
        if !joined {
            return Err(ApiError::conflict("Session is full"));
        }
        state.realtime.emit_to_room(
            &session_room(session_id),
            ServerEvent::user_joined_session(session_id, caller.user_id),
        );
    }

    let session = refresh_session_cache(&state, session_id).await?;

    Ok(Json(redact_for(session, caller.user_id)))
}

/// Explicit save of the authoritative code blob. Participant-only;
/// last writer wins.
pub async fn update_code(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpdateCodeRequest>,
) -> Result<Json<CodeSessionDto>, ApiError> {
    let meta = load_meta(&state, session_id).await?;
    if !meta.is_active {
        return Err(ApiError::conflict("Session has ended"));
    }

    if !db::is_session_participant(&state.pool, session_id, caller.user_id).await? {
        return Err(ApiError::forbidden("Only participants can save code"));
    }

    db::update_code(&state.pool, session_id, &request.code).await?;
    db::update_cursor(&state.pool, session_id, caller.user_id, 0)
        .await
        .unwrap_or_else(|e| tracing::debug!("activity touch failed: {:?}", e));

    let session = refresh_session_cache(&state, session_id).await?;

    state.realtime.emit_to_room(
        &session_room(session_id),
        ServerEvent::new(
            ServerEventKind::CodeUpdated,
            serde_json::json!({
                "session_id": session_id,
                "user_id": caller.user_id,
                "code": request.code,
                "persisted": true,
            }),
        ),
    );

    Ok(Json(redact_for(session, caller.user_id)))
}

/// End the session. Owner-only; the room is told and the record stays
/// around inactive.
pub async fn end_session(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let meta = load_meta(&state, session_id).await?;
    if meta.owner_id != caller.user_id {
        return Err(ApiError::forbidden("Only the owner can end the session"));
    }

    db::end_session(&state.pool, session_id).await?;
    refresh_session_cache(&state, session_id).await?;

    state
        .realtime
        .emit_to_room(&session_room(session_id), ServerEvent::session_ended(session_id));

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Session ended",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_codes_are_alphanumeric_and_sized() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_invite_codes_vary() {
        let a = generate_invite_code();
        let b = generate_invite_code();
        // 62^8 keyspace; equal draws would indicate a broken generator
        assert_ne!(a, b);
    }
}
