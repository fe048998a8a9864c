use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

/// Read-through response cache. Implementations must swallow their own
/// failures: an unreachable backend degrades to "always miss", it never fails
/// the request.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64);
    async fn invalidate(&self, pattern: &str);
}

/// Cache key for a read endpoint: route plus caller, so per-user responses
/// never leak across accounts. Mutations invalidate with a glob over the
/// resource family, e.g. `api:*projects*`.
pub fn cache_key(caller: uuid::Uuid, path: &str) -> String {
    format!("api:{caller}:{path}")
}

pub const RESPONSE_TTL_SECS: u64 = 300;
pub const PROJECTS_PATTERN: &str = "api:*projects*";

pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Option<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "redis unavailable, treating as cache miss");
                None
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut con = self.conn().await?;
        match con.get::<_, Option<String>>(key).await {
            Ok(hit) => {
                if hit.is_some() {
                    debug!(key, "cache hit");
                }
                hit
            }
            Err(e) => {
                warn!(error = %e, key, "redis get failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let Some(mut con) = self.conn().await else {
            return;
        };
        if let Err(e) = con.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            warn!(error = %e, key, "redis set failed");
        }
    }

    async fn invalidate(&self, pattern: &str) {
        let Some(mut con) = self.conn().await else {
            return;
        };
        let keys: Vec<String> = match con.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, pattern, "redis keys failed");
                return;
            }
        };
        if keys.is_empty() {
            return;
        }
        debug!(pattern, count = keys.len(), "invalidating cached responses");
        if let Err(e) = con.del::<_, ()>(keys).await {
            warn!(error = %e, pattern, "redis del failed");
        }
    }
}

/// Used when REDIS_URL is not configured, and in tests.
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }
    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) {}
    async fn invalidate(&self, _pattern: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn keys_are_deterministic_and_per_caller() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert_eq!(
            cache_key(alice, "/projects"),
            cache_key(alice, "/projects")
        );
        assert_ne!(cache_key(alice, "/projects"), cache_key(bob, "/projects"));
    }

    #[test]
    fn keys_match_the_invalidation_glob() {
        let key = cache_key(Uuid::new_v4(), "/projects/42/files");
        assert!(key.starts_with("api:"));
        assert!(key.contains("projects"));
    }

    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("k", "v", 60).await;
        assert_eq!(cache.get("k").await, None);
    }
}
