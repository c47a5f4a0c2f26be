pub mod config;
pub mod fmp;
pub mod http;
pub mod macrotrends;
pub mod rate_limiter;

use std::sync::Arc;

use valuation_core::StatementProvider;

pub use config::{ProviderConfig, ProviderKind};
pub use fmp::FmpProvider;
pub use http::{FetchError, StatementHttp};
pub use macrotrends::MacrotrendsProvider;
pub use rate_limiter::RateLimiter;

/// Build the configured provider. FMP requires an API key.
pub fn build_provider(
    kind: ProviderKind,
    api_key: Option<String>,
    config: ProviderConfig,
) -> Result<Arc<dyn StatementProvider>, String> {
    match kind {
        ProviderKind::Macrotrends => Ok(Arc::new(MacrotrendsProvider::new(config))),
        ProviderKind::Fmp => {
            let key = api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| "FMP_API_KEY is required for the fmp provider".to_string())?;
            Ok(Arc::new(FmpProvider::new(key, config)))
        }
    }
}
