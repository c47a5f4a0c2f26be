use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three financial statements a valuation is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::IncomeStatement => "income statement",
            StatementKind::BalanceSheet => "balance sheet",
            StatementKind::CashFlow => "cash flow statement",
        }
    }
}

/// Unit scale a provider reports its figures in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Units,
    Thousands,
    Millions,
}

impl Scale {
    pub fn multiplier(&self) -> f64 {
        match self {
            Scale::Units => 1.0,
            Scale::Thousands => 1_000.0,
            Scale::Millions => 1_000_000.0,
        }
    }
}

/// A single cell as emitted by a provider, before numeric coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Number(f64),
    Text(String),
    Empty,
}

impl From<f64> for RawCell {
    fn from(v: f64) -> Self {
        RawCell::Number(v)
    }
}

impl From<&str> for RawCell {
    fn from(v: &str) -> Self {
        RawCell::Text(v.to_string())
    }
}

impl From<Option<f64>> for RawCell {
    fn from(v: Option<f64>) -> Self {
        v.map(RawCell::Number).unwrap_or(RawCell::Empty)
    }
}

/// Which axis of a raw table carries the fiscal periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Rows are line items, columns are periods (scraped statement pages).
    PeriodsAsColumns,
    /// Rows are periods, columns are line items (JSON APIs).
    PeriodsAsRows,
    /// Let the normalizer decide from the labels.
    Detect,
}

/// Provider-shaped tabular statement. `cells[r][c]` is the value at
/// `row_labels[r]` / `column_labels[c]`; short rows are padded with empties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub orientation: Orientation,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub cells: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(
        orientation: Orientation,
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        cells: Vec<Vec<RawCell>>,
    ) -> Self {
        Self {
            orientation,
            row_labels,
            column_labels,
            cells,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&RawCell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty() || self.column_labels.is_empty()
    }
}

/// A raw statement with the unit scale its provider declared for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    pub kind: StatementKind,
    pub scale: Scale,
    pub source: String,
    pub table: RawTable,
}

/// The three raw statements for one ticker, as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatements {
    pub ticker: String,
    pub income: RawStatement,
    pub balance: RawStatement,
    pub cash_flow: RawStatement,
}

impl RawStatements {
    /// Names of the statements whose tables carry no data.
    pub fn empty_statements(&self) -> Vec<&'static str> {
        [&self.income, &self.balance, &self.cash_flow]
            .iter()
            .filter(|s| s.table.is_empty())
            .map(|s| s.kind.label())
            .collect()
    }
}

/// Canonical income statement fields, absolute units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub revenue: f64,
    pub ebitda: f64,
    pub shares_outstanding: f64,
}

/// Canonical balance sheet fields, absolute units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub cash: f64,
    pub long_term_debt: f64,
}

/// Canonical cash flow fields, absolute units. `capital_expenditure` is
/// always a non-negative magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRecord {
    pub operating_cash_flow: f64,
    pub capital_expenditure: f64,
    pub free_cash_flow: f64,
}

/// One canonical statement: fiscal year -> fixed record. Values are already
/// multiplied by `scale`; the scale is kept for reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStatement<R> {
    pub kind: StatementKind,
    pub scale: Scale,
    pub source: String,
    pub years: BTreeMap<i32, R>,
}

impl<R> CanonicalStatement<R> {
    pub fn new(kind: StatementKind, scale: Scale, source: impl Into<String>) -> Self {
        Self {
            kind,
            scale,
            source: source.into(),
            years: BTreeMap::new(),
        }
    }

    pub fn get(&self, year: i32) -> Option<&R> {
        self.years.get(&year)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Years, oldest first.
    pub fn years_ascending(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    /// Years, newest first.
    pub fn years_descending(&self) -> Vec<i32> {
        self.years.keys().rev().copied().collect()
    }

    pub fn first(&self) -> Option<(i32, &R)> {
        self.years.iter().next().map(|(y, r)| (*y, r))
    }

    pub fn last(&self) -> Option<(i32, &R)> {
        self.years.iter().next_back().map(|(y, r)| (*y, r))
    }

    /// Ascending `(year, value)` series of one field.
    pub fn series(&self, field: impl Fn(&R) -> f64) -> Vec<(i32, f64)> {
        self.years.iter().map(|(y, r)| (*y, field(r))).collect()
    }
}

pub type IncomeStatement = CanonicalStatement<IncomeRecord>;
pub type BalanceSheet = CanonicalStatement<BalanceRecord>;
pub type CashFlowStatement = CanonicalStatement<CashFlowRecord>;

/// Output of the statement normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStatements {
    pub income: IncomeStatement,
    pub balance: BalanceSheet,
    pub cash_flow: CashFlowStatement,
    pub latest_common_year: i32,
}

/// The five scalars the valuation engine needs for the latest common year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseValuationInputs {
    pub base_fcf: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub shares_outstanding: f64,
    pub discount_rate: f64,
}

/// Growth assumptions of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAssumptions {
    pub fcf_growth: f64,
    pub perpetual_growth: f64,
}

/// Raw output of one discounted-cash-flow run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcfOutput {
    pub value_per_share: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
}
