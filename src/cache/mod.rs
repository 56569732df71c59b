/**
 * Cache Layer
 *
 * Best-effort Redis read-through cache. The contract every handler relies
 * on:
 *
 * - Read path: try the cache first; on a miss (or any cache error) query
 *   persistence, shape the response DTO, populate the cache with the DTO,
 *   return.
 * - Write path: persist the mutation, re-fetch/populate relations, shape
 *   the DTO, write-through the per-id key, then pattern-invalidate every
 *   listing/per-user/stats key that could reference the old or new value
 *   of any changed foreign key.
 *
 * Cache operations never fail a request. Every error is logged and treated
 * as a miss; when `REDIS_URL` is not configured the whole service degrades
 * to a no-op and every read hits persistence. TTLs bound staleness even if
 * an invalidation step is missed.
 */

pub mod keys;

use redis::{aio::ConnectionManager, AsyncCommands};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Handle to the Redis cache. Cheap to clone; `None` when the cache is
/// not configured, in which case every operation is a no-op.
#[derive(Clone)]
pub struct CacheService {
    conn: Option<ConnectionManager>,
}

impl CacheService {
    /// Connect to Redis. Connection failures disable the cache rather
    /// than failing startup, mirroring how the database is optional in
    /// development.
    pub async fn connect(url: &str) -> Self {
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Invalid REDIS_URL, cache disabled: {:?}", e);
                return Self::disabled();
            }
        };

        match ConnectionManager::new(client).await {
            Ok(conn) => {
                tracing::info!("Cache connected");
                Self { conn: Some(conn) }
            }
            Err(e) => {
                tracing::error!("Failed to connect to Redis, cache disabled: {:?}", e);
                Self::disabled()
            }
        }
    }

    /// A cache service with no backing store; all operations no-op.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Fetch and deserialize a cached DTO. Any error is a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key, "cache entry failed to deserialize: {:?}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, "cache read failed: {:?}", e);
                None
            }
        }
    }

    /// Serialize and store a DTO with a TTL in seconds.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, "cache value failed to serialize: {:?}", e);
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            tracing::warn!(key, "cache write failed: {:?}", e);
        }
    }

    /// Delete a single key.
    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!(key, "cache delete failed: {:?}", e);
        }
    }

    /// Delete every key matching a glob pattern via SCAN.
    ///
    /// Deliberately coarse: a single task update clears all cached task
    /// listings, not just the affected page. Correctness over hit-rate.
    pub async fn delete_pattern(&self, pattern: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        let mut cursor: u64 = 0;
        loop {
            let scan: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            let (next, keys) = match scan {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(pattern, "cache pattern scan failed: {:?}", e);
                    return;
                }
            };

            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(keys).await {
                    tracing::warn!(pattern, "cache pattern delete failed: {:?}", e);
                    return;
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_is_always_a_miss() {
        let cache = CacheService::disabled();
        assert!(!cache.is_enabled());

        cache.set_json("task:abc", &serde_json::json!({"id": "abc"}), 60).await;
        let hit: Option<serde_json::Value> = cache.get_json("task:abc").await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_deletes_are_noops() {
        let cache = CacheService::disabled();
        cache.delete("task:abc").await;
        cache.delete_pattern("tasks:*").await;
    }
}
