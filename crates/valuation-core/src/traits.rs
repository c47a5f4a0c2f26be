use async_trait::async_trait;
use std::time::Duration;

use crate::{DcfReport, HistoryError, RawStatements, ValuationError};

/// A data source that returns the three raw statements for a ticker, or
/// fails. One implementation per provider; the engine never sees which.
#[async_trait]
pub trait StatementProvider: Send + Sync {
    /// Short identifier used in logs, cache rows and canonical statements.
    fn name(&self) -> &str;

    async fn fetch_statements(&self, ticker: &str) -> Result<RawStatements, ValuationError>;
}

/// Key/value cache with expiry. Values are JSON strings.
///
/// Failures are absorbed by implementations: a broken cache behaves like an
/// empty one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str);

    /// Remove every key starting with `prefix`.
    async fn clear_prefix(&self, prefix: &str);
}

/// Append-only record of valuation outcomes.
#[async_trait]
pub trait ValuationHistory: Send + Sync {
    async fn record(&self, ticker: &str, report: &DcfReport) -> Result<(), HistoryError>;
}

/// Standard cache key: `prefix:arg:arg`.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = prefix.to_string();
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}
