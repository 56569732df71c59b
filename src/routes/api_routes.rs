/**
 * API Route Handlers
 *
 * Route tables for the REST surface, split by authentication requirement.
 *
 * # Public routes
 *
 * - `POST /api/auth/signup`, `POST /api/auth/login`
 * - `GET /api/users/search`, `GET /api/users/{id}` and the follow listings
 * - `GET /api/code-sessions` (public session browser)
 *
 * # Protected routes
 *
 * Everything else requires `Authorization: Bearer <token>`; the auth
 * middleware attaches the caller before any handler runs.
 */

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::server::state::AppState;
use crate::{auth, chats, friends, meetings, notifications, projects, sessions, tasks, teams, users};

/// Routes reachable without a bearer token.
pub fn public_api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users/search", get(users::handlers::search_users))
        .route("/api/users/{id}", get(users::handlers::get_profile))
        .route(
            "/api/user/follow/{id}/followers",
            get(users::handlers::list_followers),
        )
        .route(
            "/api/user/follow/{id}/following",
            get(users::handlers::list_following),
        )
        .route("/api/code-sessions", get(sessions::handlers::list_sessions))
}

/// Routes behind the authentication middleware.
pub fn protected_api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/api/auth/me", get(auth::get_me))
        // Users / follow graph
        .route("/api/users/me", put(users::handlers::update_me))
        .route("/api/user/follow/{id}", post(users::handlers::follow_user))
        .route(
            "/api/user/follow/{id}",
            delete(users::handlers::unfollow_user),
        )
        // Friends
        .route("/api/friends/request", post(friends::handlers::send_friend_request))
        .route("/api/friends/requests", get(friends::handlers::list_friend_requests))
        .route(
            "/api/friends/respond",
            post(friends::handlers::respond_to_friend_request),
        )
        .route("/api/friends", get(friends::handlers::list_friends))
        .route("/api/friends/{user_id}", delete(friends::handlers::unfriend))
        // Tasks
        .route("/api/tasks", post(tasks::handlers::create_task))
        .route("/api/tasks", get(tasks::handlers::list_tasks))
        .route("/api/tasks/stats", get(tasks::handlers::get_task_stats))
        .route("/api/tasks/{id}", get(tasks::handlers::get_task))
        .route("/api/tasks/{id}", put(tasks::handlers::update_task))
        .route("/api/tasks/{id}", delete(tasks::handlers::delete_task))
        .route(
            "/api/tasks/{id}/status",
            patch(tasks::handlers::update_task_status),
        )
        .route(
            "/api/tasks/{id}/assign",
            patch(tasks::handlers::reassign_task),
        )
        // Meetings
        .route("/api/meetings", post(meetings::handlers::create_meeting))
        .route("/api/meetings", get(meetings::handlers::list_meetings))
        .route("/api/meetings/{id}", get(meetings::handlers::get_meeting))
        .route("/api/meetings/{id}", put(meetings::handlers::update_meeting))
        .route(
            "/api/meetings/{id}",
            delete(meetings::handlers::delete_meeting),
        )
        .route(
            "/api/meetings/{id}/status",
            patch(meetings::handlers::update_meeting_status),
        )
        .route(
            "/api/meetings/{id}/attendees",
            post(meetings::handlers::add_attendee),
        )
        .route(
            "/api/meetings/{id}/attendees/{user_id}",
            delete(meetings::handlers::remove_attendee),
        )
        // Projects
        .route("/api/projects", post(projects::handlers::create_project))
        .route("/api/projects", get(projects::handlers::list_projects))
        .route("/api/projects/{id}", get(projects::handlers::get_project))
        .route("/api/projects/{id}", put(projects::handlers::update_project))
        .route(
            "/api/projects/{id}",
            delete(projects::handlers::delete_project),
        )
        .route(
            "/api/projects/{id}/members",
            post(projects::handlers::add_member),
        )
        .route(
            "/api/projects/{id}/members/{user_id}",
            delete(projects::handlers::remove_member),
        )
        .route(
            "/api/projects/{id}/members/{user_id}/role",
            patch(projects::handlers::change_member_role),
        )
        // Teams
        .route("/api/teams", post(teams::handlers::create_team))
        .route("/api/teams", get(teams::handlers::list_teams))
        .route("/api/teams/{id}", get(teams::handlers::get_team))
        .route("/api/teams/{id}", put(teams::handlers::update_team))
        .route("/api/teams/{id}", delete(teams::handlers::delete_team))
        .route("/api/teams/{id}/members", post(teams::handlers::add_member))
        .route(
            "/api/teams/{id}/members/{user_id}",
            delete(teams::handlers::remove_member),
        )
        .route(
            "/api/teams/{id}/members/{user_id}/role",
            patch(teams::handlers::change_member_role),
        )
        // Chats and messages
        .route("/api/chats", post(chats::handlers::create_chat))
        .route("/api/chats", get(chats::handlers::list_chats))
        .route(
            "/api/chats/{id}/messages",
            get(chats::handlers::get_messages),
        )
        .route(
            "/api/chats/{id}/messages",
            post(chats::handlers::send_message),
        )
        .route("/api/chats/{id}/read", post(chats::handlers::mark_chat_read))
        .route("/api/messages/{id}", put(chats::handlers::edit_message))
        .route("/api/messages/{id}", delete(chats::handlers::delete_message))
        // Code sessions
        .route(
            "/api/code-sessions",
            post(sessions::handlers::create_session),
        )
        .route(
            "/api/code-sessions/join/{code}",
            post(sessions::handlers::join_by_code),
        )
        .route("/api/code-sessions/{id}", get(sessions::handlers::get_session))
        .route(
            "/api/code-sessions/{id}/join",
            post(sessions::handlers::join_session),
        )
        .route(
            "/api/code-sessions/{id}/leave",
            post(sessions::handlers::leave_session),
        )
        .route(
            "/api/code-sessions/{id}/invite",
            post(sessions::handlers::generate_invite),
        )
        .route(
            "/api/code-sessions/{id}/code",
            put(sessions::handlers::update_code),
        )
        .route(
            "/api/code-sessions/{id}/end",
            post(sessions::handlers::end_session),
        )
        // Notifications
        .route(
            "/api/notifications",
            get(notifications::handlers::list_notifications),
        )
        .route(
            "/api/notifications/read-all",
            patch(notifications::handlers::mark_all_read),
        )
        .route(
            "/api/notifications/{id}/read",
            patch(notifications::handlers::mark_notification_read),
        )
}
