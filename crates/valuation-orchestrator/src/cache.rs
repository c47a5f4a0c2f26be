use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use valuation_core::CacheStore;

/// Inserts between sweeps of expired entries.
const SWEEP_EVERY: usize = 64;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self) -> bool {
        let age = (Utc::now() - self.cached_at).num_milliseconds();
        age >= 0 && (age as u128) < self.ttl.as_millis()
    }
}

/// Process-local TTL cache. Expired entries are dropped when read, and
/// every `SWEEP_EVERY` inserts the whole map is swept.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry<String>>,
    inserts: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("Swept {} expired cache entries", removed);
        }
        removed
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh() {
                return Some(entry.data.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_fresh());
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                cached_at: Utc::now(),
                ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn clear_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }
}

/// Redis-backed cache that degrades to an in-process `MemoryCache` when the
/// server cannot be reached at start-up or a command fails.
pub struct RedisCache {
    manager: Option<ConnectionManager>,
    fallback: MemoryCache,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Self {
        let manager = match Self::open(url).await {
            Ok(manager) => {
                tracing::info!("Connected to Redis cache at {}", url);
                Some(manager)
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), using in-memory cache", e);
                None
            }
        };

        Self {
            manager,
            fallback: MemoryCache::new(),
        }
    }

    async fn open(url: &str) -> Result<ConnectionManager, String> {
        let client = redis::Client::open(url).map_err(|e| e.to_string())?;
        tokio::time::timeout(Duration::from_secs(5), client.get_connection_manager())
            .await
            .map_err(|_| "connection timed out".to_string())?
            .map_err(|e| e.to_string())
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_some()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        if let Some(manager) = &self.manager {
            let mut conn = manager.clone();
            match conn.get::<_, Option<String>>(key).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => tracing::warn!("Redis GET {} failed: {}", key, e),
            }
        }
        self.fallback.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        if let Some(manager) = &self.manager {
            let mut conn = manager.clone();
            match conn
                .set_ex::<_, _, ()>(key, value.as_str(), ttl.as_secs().max(1))
                .await
            {
                Ok(()) => return,
                Err(e) => tracing::warn!("Redis SETEX {} failed: {}", key, e),
            }
        }
        self.fallback.set(key, value, ttl).await;
    }

    async fn delete(&self, key: &str) {
        if let Some(manager) = &self.manager {
            let mut conn = manager.clone();
            if let Err(e) = conn.del::<_, ()>(key).await {
                tracing::warn!("Redis DEL {} failed: {}", key, e);
            }
        }
        self.fallback.delete(key).await;
    }

    async fn clear_prefix(&self, prefix: &str) {
        if let Some(manager) = &self.manager {
            let mut conn = manager.clone();
            let keys = redis::cmd("KEYS")
                .arg(format!("{}*", prefix))
                .query_async::<Vec<String>>(&mut conn)
                .await;
            match keys {
                Ok(keys) if !keys.is_empty() => {
                    if let Err(e) = conn.del::<_, ()>(keys).await {
                        tracing::warn!("Redis DEL {}* failed: {}", prefix, e);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Redis KEYS {}* failed: {}", prefix, e),
            }
        }
        self.fallback.clear_prefix(prefix).await;
    }
}
