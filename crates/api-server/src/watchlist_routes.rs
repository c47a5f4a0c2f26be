//! Watchlist of tickers to revisit.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use valuation_store::{WatchlistInput, WatchlistItem};

use crate::{ApiResponse, AppError, AppState};

const MAX_TICKER_LEN: usize = 10;
const MAX_NOTES_LEN: usize = 500;

#[derive(Deserialize)]
pub struct AddToWatchlistRequest {
    pub ticker: String,
    pub notes: Option<String>,
}

impl AddToWatchlistRequest {
    fn validate(self) -> Result<WatchlistInput, AppError> {
        let ticker = self.ticker.trim().to_uppercase();
        if ticker.is_empty() || ticker.chars().count() > MAX_TICKER_LEN {
            return Err(AppError::bad_request(format!(
                "ticker must be 1 to {} characters",
                MAX_TICKER_LEN
            )));
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(AppError::bad_request(format!(
                    "notes must be at most {} characters",
                    MAX_NOTES_LEN
                )));
            }
        }
        Ok(WatchlistInput {
            ticker,
            notes: self.notes,
        })
    }
}

pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route("/watchlist/:id", delete(remove_from_watchlist))
}

async fn list_watchlist(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<WatchlistItem>>>, AppError> {
    let watchlist = state
        .watchlist
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Watchlist"))?;

    let items = watchlist.list().await?;

    Ok(Json(ApiResponse::success(items)))
}

async fn add_to_watchlist(
    State(state): State<AppState>,
    Json(req): Json<AddToWatchlistRequest>,
) -> Result<Json<ApiResponse<WatchlistItem>>, AppError> {
    let watchlist = state
        .watchlist
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Watchlist"))?;

    let input = req.validate()?;
    let item = watchlist.add(input).await?;
    tracing::info!("Added {} to watchlist", item.ticker);

    Ok(Json(ApiResponse::success(item)))
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let watchlist = state
        .watchlist
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Watchlist"))?;

    if !watchlist.remove(id).await? {
        return Err(AppError::not_found(format!("Watchlist item {} not found", id)));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "id": id, "removed": true }))))
}
