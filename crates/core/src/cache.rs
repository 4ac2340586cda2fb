//! Notification status caching with Redis.
//!
//! Read-through cache in front of the durable store for `GetStatus`.
//! Entries expire after five minutes; every committed mutation of a row is
//! followed by an invalidation, so readers see at most TTL-bounded staleness
//! and never their own stale write.

use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use notifier_db::entities::notification;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Cache TTL: five minutes.
const CACHE_TTL_SECS: i64 = 5 * 60;

/// Key prefix for cached notifications.
const CACHE_KEY_PREFIX: &str = "notify:";

/// Read-through notification cache using Redis.
#[derive(Clone)]
pub struct StatusCache {
    redis: Arc<RedisClient>,
    ttl_secs: i64,
}

impl StatusCache {
    /// Create a new status cache with the default TTL.
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            ttl_secs: CACHE_TTL_SECS,
        }
    }

    /// Create a new status cache with a custom TTL.
    #[must_use]
    pub const fn with_ttl(redis: Arc<RedisClient>, ttl: Duration) -> Self {
        Self {
            redis,
            ttl_secs: ttl.as_secs() as i64,
        }
    }

    /// Generate the cache key for a notification id.
    fn cache_key(id: Uuid) -> String {
        format!("{CACHE_KEY_PREFIX}{id}")
    }

    /// Get a cached notification.
    ///
    /// Returns `None` on a miss; cache errors also read as misses because
    /// the durable store is the source of truth.
    pub async fn get(&self, id: Uuid) -> Option<notification::Model> {
        let key = Self::cache_key(id);

        let cached: Option<String> = match self.redis.get(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(id = %id, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let json_str = cached?;
        match serde_json::from_str(&json_str) {
            Ok(model) => {
                debug!(id = %id, "cache hit");
                Some(model)
            }
            Err(e) => {
                debug!(id = %id, error = %e, "cached value undecodable, treating as miss");
                None
            }
        }
    }

    /// Store a notification in cache. Best-effort; failures never surface.
    pub async fn put(&self, notification: &notification::Model) {
        let key = Self::cache_key(notification.id);
        let json_str = match serde_json::to_string(notification) {
            Ok(json) => json,
            Err(e) => {
                debug!(id = %notification.id, error = %e, "cache serialization failed");
                return;
            }
        };

        if let Err(e) = self
            .redis
            .set::<(), _, _>(key, json_str, Some(Expiration::EX(self.ttl_secs)), None, false)
            .await
        {
            debug!(id = %notification.id, error = %e, "cache write failed");
        }
    }

    /// Drop a cached notification. Best-effort; failures never surface.
    pub async fn invalidate(&self, id: Uuid) {
        let key = Self::cache_key(id);

        if let Err(e) = self.redis.del::<(), _>(key).await {
            debug!(id = %id, error = %e, "cache invalidation failed");
        }
    }
}
