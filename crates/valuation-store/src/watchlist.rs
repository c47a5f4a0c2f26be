use anyhow::Result;
use chrono::Utc;

use crate::db::ValuationDb;
use crate::models::{WatchlistInput, WatchlistItem};

#[derive(Clone)]
pub struct WatchlistManager {
    db: ValuationDb,
}

impl WatchlistManager {
    pub fn new(db: ValuationDb) -> Self {
        Self { db }
    }

    /// Add a ticker, or update its notes when it is already listed.
    pub async fn add(&self, input: WatchlistInput) -> Result<WatchlistItem> {
        let ticker = input.ticker.trim().to_uppercase();
        let item = sqlx::query_as::<_, WatchlistItem>(
            r#"
            INSERT INTO watchlist (ticker, notes, added_date)
            VALUES (?, ?, ?)
            ON CONFLICT(ticker) DO UPDATE SET notes = excluded.notes
            RETURNING *
            "#,
        )
        .bind(&ticker)
        .bind(&input.notes)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(self.db.pool())
        .await?;

        Ok(item)
    }

    pub async fn list(&self) -> Result<Vec<WatchlistItem>> {
        let items = sqlx::query_as::<_, WatchlistItem>(
            "SELECT * FROM watchlist ORDER BY added_date DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(items)
    }

    /// Returns whether a row was removed.
    pub async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
