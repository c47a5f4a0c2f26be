use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use statement_client::{ProviderConfig, ProviderKind};
use valuation_core::ValuationConfig;

/// Where raw statement responses are cached between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Sqlite,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub cache_backend: CacheBackend,
    pub cache_ttl: Duration,
    pub provider: ProviderKind,
    pub fmp_api_key: Option<String>,
    pub default_discount_rate: f64,
    pub frontend_url: Option<String>,
    pub provider_rate_limit: usize,
    pub provider_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let redis_url = var("REDIS_URL");
        // a configured redis url selects redis unless told otherwise
        let cache_backend = match var("CACHE_BACKEND") {
            Some(v) => v.parse().map_err(anyhow::Error::msg)?,
            None if redis_url.is_some() => CacheBackend::Redis,
            None => CacheBackend::Memory,
        };

        let provider = var("STATEMENT_PROVIDER")
            .unwrap_or_else(|| "macrotrends".to_string())
            .parse()
            .map_err(anyhow::Error::msg)?;

        let cache_ttl_secs: u64 = var("CACHE_TTL")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .context("CACHE_TTL must be a number of seconds")?;

        let default_discount_rate: f64 = var("DEFAULT_DISCOUNT_RATE")
            .unwrap_or_else(|| valuation_core::DEFAULT_DISCOUNT_RATE.to_string())
            .parse()
            .context("DEFAULT_DISCOUNT_RATE must be a decimal rate")?;

        let provider_rate_limit: usize = var("PROVIDER_RATE_LIMIT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("PROVIDER_RATE_LIMIT must be requests per minute")?;

        let provider_timeout_secs: u64 = var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("PROVIDER_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite:valuation.db".to_string()),
            redis_url,
            cache_backend,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            provider,
            fmp_api_key: var("FMP_API_KEY"),
            default_discount_rate,
            frontend_url: var("FRONTEND_URL"),
            provider_rate_limit,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            timeout: self.provider_timeout,
            rate_limit: self.provider_rate_limit,
            ..ProviderConfig::default()
        }
    }

    pub fn valuation_config(&self) -> Result<ValuationConfig> {
        let config = ValuationConfig::default().with_discount_rate(self.default_discount_rate);
        config.validate().context("invalid valuation configuration")?;
        Ok(config)
    }

    /// Local dev frontends plus `FRONTEND_URL` when set.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
        ];
        if let Some(url) = &self.frontend_url {
            let url = url.trim_end_matches('/').to_string();
            if !origins.contains(&url) {
                origins.push(url);
            }
        }
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.database_url, "sqlite:valuation.db");
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.provider, ProviderKind::Macrotrends);
        assert_eq!(config.default_discount_rate, 0.0863);
        assert_eq!(config.provider_config().rate_limit, 30);
        assert_eq!(config.allowed_origins().len(), 2);
    }

    #[test]
    fn test_redis_url_selects_redis_backend() {
        let config = config_from(&[("REDIS_URL", "redis://localhost:6379")]).unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Redis);

        let config = config_from(&[
            ("REDIS_URL", "redis://localhost:6379"),
            ("CACHE_BACKEND", "sqlite"),
        ])
        .unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Sqlite);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config_from(&[
            ("STATEMENT_PROVIDER", "fmp"),
            ("FMP_API_KEY", "secret"),
            ("CACHE_TTL", "60"),
            ("FRONTEND_URL", "https://valuation.example.com/"),
            ("PROVIDER_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Fmp);
        assert_eq!(config.fmp_api_key.as_deref(), Some("secret"));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.provider_config().timeout, Duration::from_secs(5));
        assert!(config
            .allowed_origins()
            .contains(&"https://valuation.example.com".to_string()));

        assert!(config_from(&[("CACHE_TTL", "soon")]).is_err());
        assert!(config_from(&[("STATEMENT_PROVIDER", "yahoo")]).is_err());
        assert!(config_from(&[("CACHE_BACKEND", "disk")]).is_err());
    }

    #[test]
    fn test_valuation_config_rejects_bad_rate() {
        let config = config_from(&[("DEFAULT_DISCOUNT_RATE", "0.09")]).unwrap();
        assert_eq!(config.valuation_config().unwrap().default_discount_rate, 0.09);

        // below the prospective perpetual growth rate
        let config = config_from(&[("DEFAULT_DISCOUNT_RATE", "0.02")]).unwrap();
        assert!(config.valuation_config().is_err());
    }
}
