/**
 * Server Initialization
 *
 * Assembles the application: database pool, optional cache and mailer,
 * the realtime hub, and the router.
 *
 * # Initialization Steps
 *
 * 1. Connect the database and run migrations (required)
 * 2. Connect the cache if configured (optional)
 * 3. Create the realtime hub and its periodic room cleanup task
 * 4. Build the mailer if SMTP is configured (optional)
 * 5. Assemble the router with shared state
 */

use axum::Router;

use crate::realtime::RealtimeHub;
use crate::routes::router::create_router;
use crate::server::config::{load_cache, load_database, load_mailer};
use crate::server::state::AppState;

/// Create and configure the Axum application from the environment.
pub async fn create_app() -> Result<Router<()>, Box<dyn std::error::Error>> {
    tracing::info!("Initializing crewspace backend server");

    let pool = load_database().await?;
    let cache = load_cache().await;
    let realtime = RealtimeHub::new();
    let mailer = load_mailer();

    let state = AppState {
        pool,
        cache,
        realtime,
        mailer,
    };

    // Reap room channels nobody subscribes to anymore.
    let cleanup_hub = state.realtime.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            cleanup_hub.cleanup_idle_rooms();
            tracing::debug!("Cleaned up idle realtime rooms");
        }
    });

    tracing::info!("Router configured");
    Ok(app_with_state(state))
}

/// Build the router around an already-constructed state. Used directly by
/// the integration tests, which supply their own database pool.
pub fn app_with_state(state: AppState) -> Router<()> {
    create_router(state)
}
