//! Shared test fixtures.

pub mod auth_helpers;
pub mod database;

use axum_test::TestServer;
use sqlx::PgPool;

use crewspace::cache::CacheService;
use crewspace::email::Mailer;
use crewspace::realtime::RealtimeHub;
use crewspace::server::{app_with_state, AppState};

/// Build a test server around a database pool. The cache and mailer run
/// disabled, which is exactly the degraded mode the server supports when
/// they are unconfigured; every read hits the database.
pub fn test_app(pool: PgPool) -> TestServer {
    let state = AppState {
        pool,
        cache: CacheService::disabled(),
        realtime: RealtimeHub::new(),
        mailer: Mailer::disabled(),
    };
    TestServer::new(app_with_state(state)).expect("failed to build test server")
}
