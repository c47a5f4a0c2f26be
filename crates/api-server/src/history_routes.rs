use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use valuation_store::ValuationRecord;

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub ticker: Option<String>,
    pub limit: Option<i64>,
}

/// A history row with its stored report decoded.
#[derive(Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub ticker: String,
    pub created_at: String,
    pub success: bool,
    pub error_category: Option<String>,
    pub value_per_share: Option<f64>,
    pub report: serde_json::Value,
}

impl From<ValuationRecord> for HistoryEntry {
    fn from(record: ValuationRecord) -> Self {
        let report = serde_json::from_str(&record.report)
            .unwrap_or(serde_json::Value::String(record.report));
        Self {
            id: record.id,
            ticker: record.ticker,
            created_at: record.created_at,
            success: record.success,
            error_category: record.error_category,
            value_per_share: record.value_per_share,
            report,
        }
    }
}

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/history", get(get_history))
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, AppError> {
    let store = state
        .history
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Valuation history"))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let ticker = query
        .ticker
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty());

    let records = store.recent(ticker.as_deref(), limit).await?;

    Ok(Json(ApiResponse::success(
        records.into_iter().map(HistoryEntry::from).collect(),
    )))
}
