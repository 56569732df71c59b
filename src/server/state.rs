/**
 * Application State Management
 *
 * `AppState` is the central state container handed to every handler. It
 * holds the database pool plus the injected ambient services: the cache,
 * the realtime hub, and the mailer.
 *
 * # Thread Safety
 *
 * Every field is cheap to clone and safe to share: `PgPool` is an Arc'd
 * pool, `CacheService` wraps a cloneable connection manager, and
 * `RealtimeHub` shares its room map behind `Arc`.
 *
 * # State Extraction
 *
 * The `FromRef` implementations let handlers extract only the service
 * they need (`State<PgPool>`, `State<CacheService>`, ...) instead of the
 * whole `AppState`, following Axum's substate pattern.
 */

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::cache::CacheService;
use crate::email::Mailer;
use crate::realtime::RealtimeHub;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool; the single source of truth.
    pub pool: PgPool,

    /// Best-effort Redis cache; a disabled instance no-ops every call.
    pub cache: CacheService,

    /// Injected realtime event publisher (never a process global).
    pub realtime: RealtimeHub,

    /// Optional outbound mail; fire-and-forget.
    pub mailer: Mailer,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for CacheService {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for RealtimeHub {
    fn from_ref(state: &AppState) -> Self {
        state.realtime.clone()
    }
}

impl FromRef<AppState> for Mailer {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}
