use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use valuation_core::CacheStore;

use crate::db::ValuationDb;

/// `financial_cache` table behind the `CacheStore` interface. A row older
/// than the TTL it was written with reads as a miss.
#[derive(Clone)]
pub struct SqliteCache {
    db: ValuationDb,
    source: String,
}

impl SqliteCache {
    pub fn new(db: ValuationDb, source: impl Into<String>) -> Self {
        Self {
            db,
            source: source.into(),
        }
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM financial_cache WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Option<String> {
        let row: Result<Option<(String,)>, _> = sqlx::query_as(
            "SELECT data FROM financial_cache WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(Utc::now().timestamp())
        .fetch_optional(self.db.pool())
        .await;

        match row {
            Ok(row) => row.map(|(data,)| data),
            Err(e) => {
                tracing::warn!("financial_cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Utc::now();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl_secs);

        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO financial_cache (cache_key, data, source, last_updated, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(&self.source)
        .bind(now.to_rfc3339())
        .bind(expires_at)
        .execute(self.db.pool())
        .await;

        if let Err(e) = result {
            tracing::warn!("financial_cache write failed for {}: {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = sqlx::query("DELETE FROM financial_cache WHERE cache_key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await
        {
            tracing::warn!("financial_cache delete failed for {}: {}", key, e);
        }
    }

    async fn clear_prefix(&self, prefix: &str) {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        if let Err(e) = sqlx::query("DELETE FROM financial_cache WHERE cache_key LIKE ? ESCAPE '\\'")
            .bind(pattern)
            .execute(self.db.pool())
            .await
        {
            tracing::warn!("financial_cache clear failed for {}*: {}", prefix, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> SqliteCache {
        SqliteCache::new(ValuationDb::new("sqlite::memory:").await.unwrap(), "macrotrends")
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache().await;
        assert_eq!(cache.get("statements:AAPL").await, None);

        cache
            .set("statements:AAPL", "{\"a\":1}".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("statements:AAPL").await.as_deref(), Some("{\"a\":1}"));

        cache.delete("statements:AAPL").await;
        assert_eq!(cache.get("statements:AAPL").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_a_miss() {
        let cache = cache().await;
        cache.set("statements:MSFT", "{}".to_string(), Duration::ZERO).await;
        assert_eq!(cache.get("statements:MSFT").await, None);
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_prefix() {
        let cache = cache().await;
        let ttl = Duration::from_secs(60);
        cache.set("statements:AAPL", "1".to_string(), ttl).await;
        cache.set("statements:MSFT", "2".to_string(), ttl).await;
        cache.set("statements_old:MSFT", "3".to_string(), ttl).await;
        cache.set("other:AAPL", "4".to_string(), ttl).await;

        cache.clear_prefix("statements:").await;
        assert_eq!(cache.get("statements:AAPL").await, None);
        assert_eq!(cache.get("statements:MSFT").await, None);
        assert_eq!(cache.get("statements_old:MSFT").await.as_deref(), Some("3"));
        assert_eq!(cache.get("other:AAPL").await.as_deref(), Some("4"));
    }
}
