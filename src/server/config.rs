/**
 * Server Configuration
 *
 * Configuration comes from environment variables. The database is
 * required (every request path touches it); the cache and the mailer are
 * optional services that degrade to no-ops when unconfigured, so local
 * development needs nothing beyond `DATABASE_URL`.
 *
 * Variables:
 * - `DATABASE_URL`   - PostgreSQL connection string (required)
 * - `REDIS_URL`      - cache connection string (optional)
 * - `JWT_SECRET`     - token signing secret
 * - `SERVER_PORT`    - listen port, default 3000
 * - `CORS_ORIGIN`    - allowed origin; `*` when unset
 * - `SMTP_HOST` / `SMTP_USERNAME` / `SMTP_PASSWORD` / `SMTP_FROM`
 *                    - outbound mail (optional)
 */

use axum::http::HeaderValue;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::cache::CacheService;
use crate::email::Mailer;

/// Connect to PostgreSQL and run migrations.
pub async fn load_database() -> Result<PgPool, Box<dyn std::error::Error>> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL is not set; the server cannot start without a database")?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

/// Connect the cache if `REDIS_URL` is configured; otherwise run with the
/// cache disabled and every read hitting persistence.
pub async fn load_cache() -> CacheService {
    match std::env::var("REDIS_URL") {
        Ok(url) => CacheService::connect(&url).await,
        Err(_) => {
            tracing::warn!("REDIS_URL not set; cache disabled");
            CacheService::disabled()
        }
    }
}

/// Build the mailer from SMTP settings if present.
pub fn load_mailer() -> Mailer {
    let host = std::env::var("SMTP_HOST").ok();
    let username = std::env::var("SMTP_USERNAME").ok();
    let password = std::env::var("SMTP_PASSWORD").ok();
    let from = std::env::var("SMTP_FROM").ok();

    match (host, username, password, from) {
        (Some(host), Some(username), Some(password), Some(from)) => {
            Mailer::new(&host, &username, &password, &from)
        }
        _ => {
            tracing::warn!("SMTP settings incomplete; email notifications disabled");
            Mailer::disabled()
        }
    }
}

/// CORS layer from `CORS_ORIGIN`; permissive when unset.
pub fn cors_layer() -> CorsLayer {
    match std::env::var("CORS_ORIGIN") {
        Ok(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(AllowOrigin::exact(value))
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!("CORS_ORIGIN is not a valid header value; allowing any origin");
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        },
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
