//! Statement pages scraped from macrotrends.net.
//!
//! Each statement page embeds its table as a JavaScript array assigned to
//! `originalData`: one object per line item, with an HTML `field_name` and
//! one `YYYY-MM-DD` key per fiscal period. Figures are in millions.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use valuation_core::{
    Orientation, RawCell, RawStatement, RawStatements, RawTable, Scale, StatementKind,
    StatementProvider, ValuationError,
};

use crate::config::ProviderConfig;
use crate::http::{FetchError, StatementHttp};

const BASE_URL: &str = "https://www.macrotrends.net";
pub const SOURCE: &str = "macrotrends";

static ORIGINAL_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)var\s+originalData\s*=\s*(\[.*?\]);").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

fn page_name(kind: StatementKind) -> &'static str {
    match kind {
        StatementKind::IncomeStatement => "income-statement",
        StatementKind::BalanceSheet => "balance-sheet",
        StatementKind::CashFlow => "cash-flow-statement",
    }
}

/// Company slug from the URL `/stocks/charts/{TICKER}` redirects to, e.g.
/// `/stocks/charts/AAPL/apple/stock-price-history` -> `apple`.
pub fn slug_from_path(path: &str, ticker: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let at = segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case(ticker))?;
    segments
        .get(at + 1)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn is_period_key(key: &str) -> bool {
    let b = key.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

fn to_cell(value: Option<&Value>) -> RawCell {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(RawCell::Number).unwrap_or(RawCell::Empty),
        Some(Value::String(s)) => RawCell::Text(s.clone()),
        _ => RawCell::Empty,
    }
}

/// Extract the line-item table from a statement page.
pub fn parse_statement_page(html: &str) -> Result<RawTable, FetchError> {
    let json = ORIGINAL_DATA
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| FetchError::Payload("originalData not found in page".to_string()))?
        .as_str();

    let items: Vec<Map<String, Value>> =
        serde_json::from_str(json).map_err(|e| FetchError::Payload(e.to_string()))?;

    let periods: BTreeSet<&str> = items
        .iter()
        .flat_map(|item| item.keys())
        .map(String::as_str)
        .filter(|k| is_period_key(k))
        .collect();
    // newest first, as the page shows them
    let column_labels: Vec<String> = periods.iter().rev().map(|p| p.to_string()).collect();

    let mut row_labels = Vec::with_capacity(items.len());
    let mut cells = Vec::with_capacity(items.len());
    for item in &items {
        let raw_name = item
            .get("field_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let label = HTML_TAG.replace_all(raw_name, "").replace('\\', "");
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        row_labels.push(label.to_string());
        cells.push(
            column_labels
                .iter()
                .map(|p| to_cell(item.get(p.as_str())))
                .collect(),
        );
    }

    Ok(RawTable::new(
        Orientation::PeriodsAsColumns,
        row_labels,
        column_labels,
        cells,
    ))
}

#[derive(Clone)]
pub struct MacrotrendsProvider {
    http: StatementHttp,
}

impl MacrotrendsProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http: StatementHttp::new(config),
        }
    }

    async fn resolve_slug(&self, ticker: &str) -> Result<String, FetchError> {
        let url = format!("{}/stocks/charts/{}", BASE_URL, ticker);
        let (final_url, _) = self.http.get_text(self.http.client().get(&url)).await?;
        slug_from_path(final_url.path(), ticker).ok_or_else(|| {
            FetchError::Payload(format!("ticker not listed (redirected to {})", final_url))
        })
    }

    async fn fetch_statement(
        &self,
        ticker: &str,
        slug: &str,
        kind: StatementKind,
    ) -> Result<RawStatement, FetchError> {
        let url = format!(
            "{}/stocks/charts/{}/{}/{}",
            BASE_URL,
            ticker,
            slug,
            page_name(kind)
        );
        let (_, body) = self
            .http
            .get_text(self.http.client().get(&url).query(&[("freq", "A")]))
            .await?;
        let table = parse_statement_page(&body)?;
        tracing::debug!(
            "Macrotrends {} for {}: {} line items x {} periods",
            page_name(kind),
            ticker,
            table.row_labels.len(),
            table.column_labels.len()
        );

        Ok(RawStatement {
            kind,
            scale: Scale::Millions,
            source: SOURCE.to_string(),
            table,
        })
    }
}

#[async_trait]
impl StatementProvider for MacrotrendsProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_statements(&self, ticker: &str) -> Result<RawStatements, ValuationError> {
        let fail = |e: FetchError| ValuationError::provider(ticker, format!("macrotrends: {}", e));

        let slug = self.resolve_slug(ticker).await.map_err(fail)?;
        let (income, balance, cash_flow) = tokio::try_join!(
            self.fetch_statement(ticker, &slug, StatementKind::IncomeStatement),
            self.fetch_statement(ticker, &slug, StatementKind::BalanceSheet),
            self.fetch_statement(ticker, &slug, StatementKind::CashFlow),
        )
        .map_err(fail)?;

        let statements = RawStatements {
            ticker: ticker.to_string(),
            income,
            balance,
            cash_flow,
        };

        let empty = statements.empty_statements();
        if !empty.is_empty() {
            return Err(ValuationError::provider(
                ticker,
                format!("macrotrends returned no data for: {}", empty.join(", ")),
            ));
        }

        tracing::info!("Fetched Macrotrends statements for {} ({})", ticker, slug);
        Ok(statements)
    }
}
