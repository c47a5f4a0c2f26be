use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Construction parameters for a statement provider. Passed explicitly;
/// providers never read the environment themselves.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Requests per minute across all statement pages.
    pub rate_limit: usize,
    pub max_attempts: u32,
    /// Pause before retrying a 429 response.
    pub retry_wait: Duration,
    /// Annual periods requested from paginated APIs.
    pub history_limit: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: 30,
            max_attempts: 3,
            retry_wait: Duration::from_secs(15),
            history_limit: 10,
        }
    }
}

/// Which statement source the server is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Macrotrends,
    Fmp,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Macrotrends => "macrotrends",
            ProviderKind::Fmp => "fmp",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "macrotrends" => Ok(ProviderKind::Macrotrends),
            "fmp" | "financialmodelingprep" => Ok(ProviderKind::Fmp),
            other => Err(format!("unknown statement provider '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("macrotrends".parse::<ProviderKind>(), Ok(ProviderKind::Macrotrends));
        assert_eq!(" FMP ".parse::<ProviderKind>(), Ok(ProviderKind::Fmp));
        assert!("yahoo".parse::<ProviderKind>().is_err());
    }
}
