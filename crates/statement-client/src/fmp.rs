//! Financial Modeling Prep statement endpoints.

use async_trait::async_trait;
use serde_json::Value;
use valuation_core::{
    Orientation, RawCell, RawStatement, RawStatements, RawTable, Scale, StatementKind,
    StatementProvider, ValuationError,
};

use crate::config::ProviderConfig;
use crate::http::{FetchError, StatementHttp};

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const SOURCE: &str = "fmp";

/// Descriptive keys that are not line items.
const METADATA_KEYS: &[&str] = &[
    "date",
    "symbol",
    "reportedCurrency",
    "cik",
    "fillingDate",
    "acceptedDate",
    "calendarYear",
    "period",
    "link",
    "finalLink",
];

fn endpoint(kind: StatementKind) -> &'static str {
    match kind {
        StatementKind::IncomeStatement => "income-statement",
        StatementKind::BalanceSheet => "balance-sheet-statement",
        StatementKind::CashFlow => "cash-flow-statement",
    }
}

fn to_cell(value: Option<&Value>) -> RawCell {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(RawCell::Number).unwrap_or(RawCell::Empty),
        Some(Value::String(s)) => RawCell::Text(s.clone()),
        _ => RawCell::Empty,
    }
}

/// Turn an endpoint payload (array of period objects) into a table with one
/// row per period, labelled by its `date`.
pub fn parse_statement_rows(payload: &Value) -> Result<RawTable, FetchError> {
    let rows = match payload {
        Value::Array(rows) => rows,
        Value::Object(obj) => {
            let message = obj
                .get("Error Message")
                .and_then(Value::as_str)
                .unwrap_or("object payload instead of statement rows");
            return Err(FetchError::Payload(message.to_string()));
        }
        _ => return Err(FetchError::Payload("statement rows missing".to_string())),
    };

    let mut column_labels: Vec<String> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for key in row.keys() {
            if !METADATA_KEYS.contains(&key.as_str()) && !column_labels.contains(key) {
                column_labels.push(key.clone());
            }
        }
    }

    let mut row_labels = Vec::with_capacity(rows.len());
    let mut cells = Vec::with_capacity(rows.len());
    for row in rows.iter().filter_map(Value::as_object) {
        let Some(date) = row.get("date").and_then(Value::as_str) else {
            continue;
        };
        row_labels.push(date.to_string());
        cells.push(column_labels.iter().map(|c| to_cell(row.get(c))).collect());
    }

    Ok(RawTable::new(
        Orientation::PeriodsAsRows,
        row_labels,
        column_labels,
        cells,
    ))
}

#[derive(Clone)]
pub struct FmpProvider {
    http: StatementHttp,
    api_key: String,
    limit: u32,
}

impl FmpProvider {
    pub fn new(api_key: String, config: ProviderConfig) -> Self {
        let limit = config.history_limit;
        Self {
            http: StatementHttp::new(config),
            api_key,
            limit,
        }
    }

    async fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
    ) -> Result<RawStatement, FetchError> {
        let url = format!("{}/{}/{}", BASE_URL, endpoint(kind), ticker);
        let limit = self.limit.to_string();
        let (_, body) = self
            .http
            .get_text(self.http.client().get(&url).query(&[
                ("period", "annual"),
                ("limit", limit.as_str()),
                ("apikey", self.api_key.as_str()),
            ]))
            .await?;

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Payload(e.to_string()))?;
        let table = parse_statement_rows(&payload)?;

        Ok(RawStatement {
            kind,
            scale: Scale::Units,
            source: SOURCE.to_string(),
            table,
        })
    }
}

#[async_trait]
impl StatementProvider for FmpProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_statements(&self, ticker: &str) -> Result<RawStatements, ValuationError> {
        let (income, balance, cash_flow) = tokio::try_join!(
            self.fetch_statement(ticker, StatementKind::IncomeStatement),
            self.fetch_statement(ticker, StatementKind::BalanceSheet),
            self.fetch_statement(ticker, StatementKind::CashFlow),
        )
        .map_err(|e| ValuationError::provider(ticker, format!("fmp: {}", e)))?;

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
                format!("fmp returned no data for: {}", empty.join(", ")),
            ));
        }

        tracing::info!("Fetched FMP statements for {}", ticker);
        Ok(statements)
    }
}
