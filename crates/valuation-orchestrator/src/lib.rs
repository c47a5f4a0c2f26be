use dcf_analysis::{normalize, DcfAnalysisEngine};
use std::sync::Arc;
use std::time::Duration;
use valuation_core::{
    cache_key, CacheStore, DcfFailure, DcfReport, FinancialsReport, Observations, RawStatements,
    StatementProvider, ValuationConfig, ValuationError, ValuationHistory,
};

pub mod cache;
pub use cache::{MemoryCache, RedisCache};

pub const STATEMENTS_CACHE_PREFIX: &str = "statements";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const MAX_TICKER_LEN: usize = 10;

/// Tickers are interpolated into provider URL paths, so only exchange
/// symbol characters are accepted: ASCII alphanumerics, `.` and `-`.
fn check_ticker(ticker: &str) -> Result<(), ValuationError> {
    if ticker.is_empty() {
        return Err(ValuationError::provider(ticker, "empty ticker symbol"));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(ValuationError::provider(
            ticker,
            format!("ticker symbol longer than {} characters", MAX_TICKER_LEN),
        ));
    }
    if let Some(c) = ticker
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(ValuationError::provider(
            ticker,
            format!("invalid character {:?} in ticker symbol", c),
        ));
    }
    Ok(())
}

/// Runs the valuation pipeline for one ticker at a time: fetch (through the
/// cache when one is configured), normalize, value both scenarios, shape the
/// result and hand it to the history collaborator.
pub struct ValuationOrchestrator {
    provider: Arc<dyn StatementProvider>,
    engine: DcfAnalysisEngine,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl: Duration,
    history: Option<Arc<dyn ValuationHistory>>,
}

impl ValuationOrchestrator {
    pub fn new(provider: Arc<dyn StatementProvider>, config: ValuationConfig) -> Self {
        Self {
            provider,
            engine: DcfAnalysisEngine::new(config),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            history: None,
        }
    }

    /// Cache raw provider responses for `ttl`.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Record every report, successful or not.
    pub fn with_history(mut self, history: Arc<dyn ValuationHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &ValuationConfig {
        self.engine.config()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn load_statements(&self, ticker: &str) -> Result<RawStatements, ValuationError> {
        check_ticker(ticker)?;

        let key = cache_key(STATEMENTS_CACHE_PREFIX, &[ticker]);
        if let Some(cache) = &self.cache {
            if let Some(json) = cache.get(&key).await {
                match serde_json::from_str::<RawStatements>(&json) {
                    Ok(raw) => {
                        tracing::debug!("Statements for {} served from cache", ticker);
                        return Ok(raw);
                    }
                    Err(e) => {
                        tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                        cache.delete(&key).await;
                    }
                }
            }
        }

        let raw = self.provider.fetch_statements(ticker).await?;

        let empty = raw.empty_statements();
        if !empty.is_empty() {
            return Err(ValuationError::provider(
                ticker,
                format!("{} returned no data for: {}", self.provider.name(), empty.join(", ")),
            ));
        }

        if let Some(cache) = &self.cache {
            match serde_json::to_string(&raw) {
                Ok(json) => cache.set(&key, json, self.cache_ttl).await,
                Err(e) => tracing::warn!("Could not serialize statements for {}: {}", ticker, e),
            }
        }

        Ok(raw)
    }

    fn failure(&self, ticker: &str, err: &ValuationError, obs: Observations) -> DcfFailure {
        tracing::warn!("Valuation for {} failed ({}): {}", ticker, err.category().as_str(), err);
        DcfFailure::from_error(ticker, err, &self.config().suggested_alternatives, obs.into_vec())
    }

    /// Value `ticker` under the prospective and historical scenarios.
    ///
    /// Never fails: every error becomes a `DcfReport::Failure` record.
    pub async fn run_dcf(&self, ticker: &str, discount_rate: Option<f64>) -> DcfReport {
        let ticker = ticker.trim().to_uppercase();
        tracing::info!("Starting DCF valuation for {} via {}", ticker, self.provider.name());

        let mut obs = Observations::new();
        let outcome = match self.load_statements(&ticker).await {
            Ok(raw) => self.engine.evaluate(&raw, discount_rate, &mut obs),
            Err(e) => Err(e),
        };

        let report = match outcome {
            Ok(valuation) => DcfReport::Success(valuation),
            Err(err) => DcfReport::Failure(self.failure(&ticker, &err, obs)),
        };

        if let Some(history) = &self.history {
            if let Err(e) = history.record(&ticker, &report).await {
                tracing::error!("Failed to record valuation for {}: {}", ticker, e);
            }
        }

        report
    }

    /// Canonical statements for display, in absolute units.
    pub async fn financials(&self, ticker: &str) -> FinancialsReport {
        let ticker = ticker.trim().to_uppercase();
        let mut obs = Observations::new();

        let outcome = match self.load_statements(&ticker).await {
            Ok(raw) => normalize(&raw, &mut obs),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(statements) => FinancialsReport::Success {
                success: true,
                ticker,
                statements,
                observations: obs.into_vec(),
            },
            Err(err) => FinancialsReport::Failure(self.failure(&ticker, &err, obs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use valuation_core::{
        ErrorCategory, HistoryError, ObservationCode, Orientation, RawCell, RawStatement,
        RawTable, Scale, StatementKind,
    };

    fn table(rows: &[&str], cols: &[&str], cells: Vec<Vec<f64>>) -> RawTable {
        RawTable::new(
            Orientation::PeriodsAsColumns,
            rows.iter().map(|s| s.to_string()).collect(),
            cols.iter().map(|s| s.to_string()).collect(),
            cells
                .into_iter()
                .map(|r| r.into_iter().map(RawCell::Number).collect())
                .collect(),
        )
    }

    fn statement(kind: StatementKind, table: RawTable) -> RawStatement {
        RawStatement {
            kind,
            scale: Scale::Units,
            source: "fake".to_string(),
            table,
        }
    }

    fn reference_statements(ticker: &str) -> RawStatements {
        RawStatements {
            ticker: ticker.to_string(),
            income: statement(
                StatementKind::IncomeStatement,
                table(
                    &["Revenue", "EBITDA", "Shares Outstanding"],
                    &["2022", "2023"],
                    vec![
                        vec![4_800_000.0, 5_000_000.0],
                        vec![1_450_000.0, 1_500_000.0],
                        vec![100_000.0, 100_000.0],
                    ],
                ),
            ),
            balance: statement(
                StatementKind::BalanceSheet,
                table(
                    &["Cash On Hand", "Long Term Debt"],
                    &["2022", "2023"],
                    vec![vec![150_000.0, 200_000.0], vec![520_000.0, 500_000.0]],
                ),
            ),
            cash_flow: statement(
                StatementKind::CashFlow,
                table(
                    &["Operating Cash Flow", "Capital Expenditure"],
                    &["2022", "2023"],
                    vec![vec![1_250_000.0, 1_300_000.0], vec![-300_000.0, -300_000.0]],
                ),
            ),
        }
    }

    enum Behaviour {
        Serve(RawStatements),
        Fail(String),
    }

    struct FakeProvider {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StatementProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_statements(&self, ticker: &str) -> Result<RawStatements, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Serve(raw) => Ok(raw.clone()),
                Behaviour::Fail(reason) => Err(ValuationError::provider(ticker, reason.clone())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingHistory {
        rows: Mutex<Vec<(String, bool)>>,
        broken: bool,
    }

    #[async_trait]
    impl ValuationHistory for RecordingHistory {
        async fn record(&self, ticker: &str, report: &DcfReport) -> Result<(), HistoryError> {
            if self.broken {
                return Err(HistoryError("disk full".to_string()));
            }
            if let Ok(mut rows) = self.rows.lock() {
                rows.push((ticker.to_string(), report.is_success()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_dcf_success() {
        let provider = FakeProvider::new(Behaviour::Serve(reference_statements("REF")));
        let orchestrator = ValuationOrchestrator::new(provider, ValuationConfig::default());

        match orchestrator.run_dcf("ref", None).await {
            DcfReport::Success(v) => {
                assert_eq!(v.base_data.ticker, "REF");
                assert_eq!(v.base_data.latest_year, 2023);
                assert_eq!(v.base_data.discount_rate, 0.0863);
                assert_eq!(v.scenario_prospective.name, "prospective");
                assert!((v.scenario_prospective.intrinsic_value_per_share - 183.283_928_453_505_18).abs() < 1e-6);
                // EBITDA grew ~3.45%, capped at the prospective 2.5%
                assert_eq!(v.scenario_historical.perpetual_growth, 0.025);
                assert!(v
                    .observations
                    .iter()
                    .any(|o| o.code == ObservationCode::GrowthRateClamped));
            }
            DcfReport::Failure(f) => panic!("unexpected failure: {}", f.error_message),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_record() {
        let provider = FakeProvider::new(Behaviour::Fail("HTTP 404".to_string()));
        let orchestrator = ValuationOrchestrator::new(provider, ValuationConfig::default());

        let report = orchestrator.run_dcf("ZZZZ", None).await;
        assert_eq!(report.error_category(), Some(ErrorCategory::ProviderUnavailable));
        match report {
            DcfReport::Failure(f) => {
                assert!(!f.success);
                assert_eq!(f.ticker, "ZZZZ");
                assert!(f.error_message.contains("HTTP 404"));
                assert_eq!(
                    f.suggested_alternatives,
                    Some(vec!["AAPL".into(), "MSFT".into(), "GOOGL".into(), "AMZN".into()])
                );
            }
            DcfReport::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_empty_statement_is_provider_unavailable() {
        let mut raw = reference_statements("EMPTY");
        raw.balance.table = RawTable::new(Orientation::PeriodsAsColumns, vec![], vec![], vec![]);
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(raw)),
            ValuationConfig::default(),
        );
        let report = orchestrator.run_dcf("EMPTY", None).await;
        assert_eq!(report.error_category(), Some(ErrorCategory::ProviderUnavailable));
    }

    #[tokio::test]
    async fn test_missing_field_is_data_unavailable() {
        let mut raw = reference_statements("NOCASH");
        raw.balance.table.row_labels = vec!["Goodwill".to_string(), "Long Term Debt".to_string()];
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(raw)),
            ValuationConfig::default(),
        );
        match orchestrator.run_dcf("NOCASH", None).await {
            DcfReport::Failure(f) => {
                assert_eq!(f.error_category, ErrorCategory::DataUnavailable);
                assert!(f.error_message.contains("Goodwill"));
                assert!(f.suggested_alternatives.is_some());
            }
            DcfReport::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_invalid_discount_rate_has_no_alternatives() {
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(reference_statements("REF"))),
            ValuationConfig::default(),
        );
        match orchestrator.run_dcf("REF", Some(0.02)).await {
            DcfReport::Failure(f) => {
                assert_eq!(f.error_category, ErrorCategory::InvalidValuationInput);
                assert!(f.suggested_alternatives.is_none());
            }
            DcfReport::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_run_dcf_is_idempotent_and_cached() {
        let provider = FakeProvider::new(Behaviour::Serve(reference_statements("REF")));
        let orchestrator = ValuationOrchestrator::new(provider.clone(), ValuationConfig::default())
            .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let first = orchestrator.run_dcf("REF", Some(0.1)).await;
        let second = orchestrator.run_dcf("REF", Some(0.1)).await;

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_preserves_full_precision() {
        let mut raw = reference_statements("REF");
        raw.cash_flow.table.cells[0][0] = RawCell::Number(1_891_198_858.876_495_4);
        let provider = FakeProvider::new(Behaviour::Serve(raw));
        let orchestrator = ValuationOrchestrator::new(provider.clone(), ValuationConfig::default())
            .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let fresh = orchestrator.run_dcf("REF", None).await;
        let cached = orchestrator.run_dcf("REF", None).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(fresh.is_success());
        assert_eq!(
            serde_json::to_string(&fresh).unwrap(),
            serde_json::to_string(&cached).unwrap()
        );
    }

    #[test]
    fn test_check_ticker() {
        for ok in ["AAPL", "BRK.B", "RDS-A", "7203", "ABCDEFGHIJ"] {
            assert!(check_ticker(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "AAPL/../X", "AAPL%2F", "A B", "ABCDEFGHIJK", "ÄPPLE"] {
            let err = check_ticker(bad).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::ProviderUnavailable, "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_malformed_ticker_never_reaches_provider() {
        let provider = FakeProvider::new(Behaviour::Serve(reference_statements("REF")));
        let orchestrator = ValuationOrchestrator::new(provider.clone(), ValuationConfig::default());

        let report = orchestrator.run_dcf("aapl/../x", None).await;
        assert_eq!(report.error_category(), Some(ErrorCategory::ProviderUnavailable));
        let report = orchestrator.financials("AAPL?x=1").await;
        assert!(matches!(report, FinancialsReport::Failure(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = FakeProvider::new(Behaviour::Fail("timeout".to_string()));
        let cache = Arc::new(MemoryCache::new());
        let orchestrator = ValuationOrchestrator::new(provider.clone(), ValuationConfig::default())
            .with_cache(cache.clone(), Duration::from_secs(60));

        orchestrator.run_dcf("ZZZZ", None).await;
        orchestrator.run_dcf("ZZZZ", None).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_history_records_every_outcome() {
        let history = Arc::new(RecordingHistory::default());
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(reference_statements("REF"))),
            ValuationConfig::default(),
        )
        .with_history(history.clone());

        orchestrator.run_dcf("REF", None).await;
        orchestrator.run_dcf("REF", Some(0.01)).await;

        let rows = history.rows.lock().unwrap().clone();
        assert_eq!(rows, vec![("REF".to_string(), true), ("REF".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_broken_history_does_not_change_result() {
        let history = Arc::new(RecordingHistory {
            broken: true,
            ..Default::default()
        });
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(reference_statements("REF"))),
            ValuationConfig::default(),
        )
        .with_history(history);
        assert!(orchestrator.run_dcf("REF", None).await.is_success());
    }

    #[tokio::test]
    async fn test_financials_view() {
        let orchestrator = ValuationOrchestrator::new(
            FakeProvider::new(Behaviour::Serve(reference_statements("REF"))),
            ValuationConfig::default(),
        );
        match orchestrator.financials("REF").await {
            FinancialsReport::Success { statements, ticker, .. } => {
                assert_eq!(ticker, "REF");
                assert_eq!(statements.latest_common_year, 2023);
                assert_eq!(statements.cash_flow.get(2022).unwrap().free_cash_flow, 950_000.0);
            }
            FinancialsReport::Failure(f) => panic!("unexpected failure: {}", f.error_message),
        }
    }
}
