use serde::{Deserialize, Serialize};

/// One row of the append-only valuation log.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ValuationRecord {
    pub id: i64,
    pub ticker: String,
    pub created_at: String,
    pub success: bool,
    pub error_category: Option<String>,
    /// Prospective-scenario value per share, when the run succeeded.
    pub value_per_share: Option<f64>,
    /// The full report as returned to the caller.
    pub report: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchlistItem {
    pub id: i64,
    pub ticker: String,
    pub notes: Option<String>,
    pub added_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistInput {
    pub ticker: String,
    pub notes: Option<String>,
}
