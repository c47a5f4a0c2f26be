use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use valuation_core::{DcfReport, HistoryError, ValuationHistory};

use crate::db::ValuationDb;
use crate::models::ValuationRecord;

/// Append-only log of every valuation outcome, successful or not.
#[derive(Clone)]
pub struct ValuationStore {
    db: ValuationDb,
}

impl ValuationStore {
    pub fn new(db: ValuationDb) -> Self {
        Self { db }
    }

    /// Append one report. Returns the new row id.
    pub async fn append(&self, ticker: &str, report: &DcfReport) -> Result<i64> {
        let json = serde_json::to_string(report).context("failed to serialize report")?;
        let (success, error_category, value_per_share) = match report {
            DcfReport::Success(v) => (
                true,
                None,
                Some(v.scenario_prospective.intrinsic_value_per_share),
            ),
            DcfReport::Failure(f) => (false, Some(f.error_category.as_str()), None),
        };

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO valuation_history
            (ticker, created_at, success, error_category, value_per_share, report)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(ticker)
        .bind(Utc::now().to_rfc3339())
        .bind(success)
        .bind(error_category)
        .bind(value_per_share)
        .bind(&json)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    /// Most recent rows first, optionally for one ticker.
    pub async fn recent(&self, ticker: Option<&str>, limit: i64) -> Result<Vec<ValuationRecord>> {
        let records = match ticker {
            Some(ticker) => {
                sqlx::query_as::<_, ValuationRecord>(
                    r#"
                    SELECT * FROM valuation_history
                    WHERE ticker = ?
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(ticker)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, ValuationRecord>(
                    "SELECT * FROM valuation_history ORDER BY id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(records)
    }
}

#[async_trait]
impl ValuationHistory for ValuationStore {
    async fn record(&self, ticker: &str, report: &DcfReport) -> Result<(), HistoryError> {
        self.append(ticker, report)
            .await
            .map(|_| ())
            .map_err(|e| HistoryError(format!("{:#}", e)))
    }
}
