/**
 * Router Configuration
 *
 * Combines the route tables into one Axum router:
 *
 * 1. Public API routes (signup/login, public search and listings)
 * 2. Protected API routes behind the bearer-token middleware
 * 3. The WebSocket endpoint (token verified at handshake)
 * 4. CORS layer and a JSON 404 fallback
 */

use axum::{middleware, routing::get, Json, Router};

use crate::middleware::auth::auth_middleware;
use crate::realtime::socket::ws_handler;
use crate::routes::api_routes::{protected_api_routes, public_api_routes};
use crate::server::config::cors_layer;
use crate::server::state::AppState;

/// Create the Axum router with all routes configured.
pub fn create_router(state: AppState) -> Router<()> {
    let protected = protected_api_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    Router::new()
        .merge(public_api_routes())
        .merge(protected)
        // WebSocket handshake authenticates via its token query parameter
        .route("/ws", get(ws_handler))
        .layer(cors_layer())
        .fallback(|| async {
            (
                axum::http::StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "success": false,
                    "message": "Not found",
                })),
            )
        })
        .with_state(state)
}
