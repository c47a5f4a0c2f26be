//! HTTP adapter over the valuation orchestrator.

pub mod config;
mod history_routes;
mod valuation_routes;
mod watchlist_routes;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use statement_client::build_provider;
use valuation_core::CacheStore;
use valuation_orchestrator::{MemoryCache, RedisCache, ValuationOrchestrator};
use valuation_store::{SqliteCache, ValuationDb, ValuationStore, WatchlistManager};

pub use config::{CacheBackend, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ValuationOrchestrator>,
    /// `None` when the database could not be opened.
    pub history: Option<ValuationStore>,
    pub watchlist: Option<WatchlistManager>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Handler error: an `anyhow::Error` plus the status it maps to.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!(msg.into()))
    }

    pub fn unavailable(what: &str) -> Self {
        Self::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            anyhow::anyhow!("{} not initialized", what),
        )
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.status, self.error);
        }
        (self.status, Json(ApiResponse::error(format!("{:#}", self.error)))).into_response()
    }
}

/// All routes with CORS for `allowed_origins` and request tracing.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(valuation_routes::valuation_routes())
        .merge(history_routes::history_routes())
        .merge(watchlist_routes::watchlist_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn build_cache(config: &ServerConfig, db: Option<&ValuationDb>) -> Arc<dyn CacheStore> {
    match (config.cache_backend, config.redis_url.as_deref(), db) {
        (CacheBackend::Redis, Some(url), _) => Arc::new(RedisCache::connect(url).await),
        (CacheBackend::Redis, None, _) => {
            tracing::warn!("CACHE_BACKEND=redis without REDIS_URL, using in-memory cache");
            Arc::new(MemoryCache::new())
        }
        (CacheBackend::Sqlite, _, Some(db)) => {
            let cache = SqliteCache::new(db.clone(), config.provider.as_str());
            match cache.purge_expired().await {
                Ok(n) if n > 0 => tracing::info!("Purged {} expired cache rows", n),
                Ok(_) => {}
                Err(e) => tracing::warn!("Cache purge failed: {:#}", e),
            }
            Arc::new(cache)
        }
        (CacheBackend::Sqlite, _, None) => {
            tracing::warn!("SQLite cache requested but the database is unavailable, using in-memory cache");
            Arc::new(MemoryCache::new())
        }
        (CacheBackend::Memory, _, _) => Arc::new(MemoryCache::new()),
    }
}

/// Wire provider, cache, persistence and orchestrator from the config.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let provider = build_provider(
        config.provider,
        config.fmp_api_key.clone(),
        config.provider_config(),
    )
    .map_err(anyhow::Error::msg)?;

    let db = match ValuationDb::new(&config.database_url).await {
        Ok(db) => {
            tracing::info!("Database ready at {}", config.database_url);
            Some(db)
        }
        Err(e) => {
            tracing::warn!("Persistence disabled, database unavailable: {:#}", e);
            None
        }
    };

    let cache = build_cache(config, db.as_ref()).await;
    let history = db.clone().map(ValuationStore::new);
    let watchlist = db.map(WatchlistManager::new);

    let mut orchestrator = ValuationOrchestrator::new(provider, config.valuation_config()?)
        .with_cache(cache, config.cache_ttl);
    if let Some(store) = &history {
        orchestrator = orchestrator.with_history(Arc::new(store.clone()));
    }

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        history,
        watchlist,
    })
}

/// `RUST_LOG` filter (default `info`); `RUST_LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let state = build_state(&config).await?;
    tracing::info!(
        "Statement provider: {}, cache: {:?}, ttl {}s",
        state.orchestrator.provider_name(),
        config.cache_backend,
        config.cache_ttl.as_secs()
    );

    let app = build_router(state, &config.allowed_origins());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("DCF valuation API listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
