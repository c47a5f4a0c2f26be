//! Valuation endpoints: service status, DCF valuation and the canonical
//! financial statements it is computed from.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use valuation_core::{DcfReport, ErrorCategory, FinancialsReport};

use crate::{AppError, AppState};

#[derive(Deserialize)]
pub struct DcfQuery {
    pub discount_rate: Option<f64>,
}

pub fn valuation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/dcf-valuation/:ticker", get(dcf_valuation))
        .route("/financials/:ticker", get(financials))
}

/// HTTP status for a failed request, by error category.
fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::ProviderUnavailable | ErrorCategory::DataUnavailable => StatusCode::NOT_FOUND,
        ErrorCategory::InvalidValuationInput => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::ComputationIntegrity => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "dcf-valuation",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.orchestrator.provider_name(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "persistence": state.history.is_some(),
    }))
}

async fn dcf_valuation(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<(StatusCode, Json<DcfReport>), AppError> {
    if let Some(rate) = query.discount_rate {
        if !(rate > 0.0 && rate < 1.0) {
            return Err(AppError::bad_request(format!(
                "discount_rate must be between 0 and 1 (exclusive), got {}",
                rate
            )));
        }
    }

    let report = state.orchestrator.run_dcf(&ticker, query.discount_rate).await;
    let status = report.error_category().map(status_for).unwrap_or(StatusCode::OK);

    Ok((status, Json(report)))
}

async fn financials(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> (StatusCode, Json<FinancialsReport>) {
    let report = state.orchestrator.financials(&ticker).await;
    let status = match &report {
        FinancialsReport::Success { .. } => StatusCode::OK,
        FinancialsReport::Failure(failure) => status_for(failure.error_category),
    };

    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_root_and_health() {
        let app = test_app(test_state().await);

        let (status, json) = send(app.clone(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["provider"], "fake");

        let (status, json) = send(app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["persistence"], true);
    }

    #[tokio::test]
    async fn test_dcf_valuation_success() {
        let app = test_app(test_state().await);
        let (status, json) = send(app, get("/dcf-valuation/ref")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["base_data"]["ticker"], "REF");
        assert_eq!(json["base_data"]["latest_year"], 2023);
        let per_share = json["scenario_prospective"]["intrinsic_value_per_share"]
            .as_f64()
            .unwrap();
        assert!((per_share - 183.283_928_453_505_18).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dcf_valuation_custom_rate() {
        let app = test_app(test_state().await);
        let (status, json) = send(app, get("/dcf-valuation/REF?discount_rate=0.1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["base_data"]["discount_rate"], 0.1);
    }

    #[tokio::test]
    async fn test_dcf_valuation_rejects_out_of_range_rate() {
        let app = test_app(test_state().await);
        for uri in [
            "/dcf-valuation/REF?discount_rate=0",
            "/dcf-valuation/REF?discount_rate=1.5",
            "/dcf-valuation/REF?discount_rate=-0.1",
        ] {
            let (status, json) = send(app.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json["success"], false);
        }
    }

    #[tokio::test]
    async fn test_dcf_valuation_failure_statuses() {
        let app = test_app(test_state().await);

        let (status, json) = send(app.clone(), get("/dcf-valuation/ZZZZ")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error_category"], "provider_unavailable");
        assert_eq!(json["suggested_alternatives"][0], "AAPL");

        let (status, json) = send(app.clone(), get("/dcf-valuation/GAP")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error_category"], "data_unavailable");

        let (status, json) = send(app, get("/dcf-valuation/NEG")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_category"], "invalid_valuation_input");
    }

    #[tokio::test]
    async fn test_rate_at_perpetual_growth_is_unprocessable() {
        let app = test_app(test_state().await);
        let (status, json) = send(app, get("/dcf-valuation/REF?discount_rate=0.025")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_category"], "invalid_valuation_input");
    }

    #[tokio::test]
    async fn test_financials() {
        let app = test_app(test_state().await);

        let (status, json) = send(app.clone(), get("/financials/REF")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ticker"], "REF");
        assert_eq!(json["statements"]["latest_common_year"], 2023);

        let (status, json) = send(app, get("/financials/ZZZZ")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error_category"], "provider_unavailable");
    }
}
