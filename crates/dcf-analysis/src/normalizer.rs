//! Raw provider tables -> canonical year-indexed statements.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate};
use valuation_core::{
    BalanceRecord, BalanceSheet, CanonicalStatement, CashFlowRecord, CashFlowStatement,
    IncomeRecord, IncomeStatement, NormalizedStatements, ObservationCode, Observations,
    Orientation, RawCell, RawStatement, RawStatements, RawTable, StatementKind, StatementScope,
    ValuationError,
};

use crate::resolver::{resolve_query, MetricQuery};

/// One required canonical field of a statement.
struct FieldSpec {
    name: &'static str,
    query: MetricQuery<'static>,
}

const INCOME_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "revenue",
        query: MetricQuery::new("Revenue")
            .with_fallbacks(&["Total Revenue", "Revenues", "Net Sales", "Sales"]),
    },
    FieldSpec {
        name: "ebitda",
        query: MetricQuery::new("EBITDA")
            .with_fallbacks(&["Normalized EBITDA"])
            .with_fragments(&[&["ebit", "da"], &["ebit", "depreciation"]]),
    },
    FieldSpec {
        name: "shares_outstanding",
        query: MetricQuery::new("Shares Outstanding")
            .with_fallbacks(&[
                "Diluted Shares Outstanding",
                "weightedAverageShsOutDil",
                "Weighted Average Shares Outstanding Diluted",
                "weightedAverageShsOut",
                "Basic Shares Outstanding",
            ])
            .with_fragments(&[&["shares", "outstanding"], &["weighted", "shs"]]),
    },
];

const BALANCE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "cash",
        query: MetricQuery::new("Cash On Hand")
            .with_fallbacks(&[
                "Cash And Cash Equivalents",
                "Cash And Equivalents",
                "Cash",
            ])
            .with_fragments(&[&["cash", "equivalent"]]),
    },
    FieldSpec {
        name: "long_term_debt",
        query: MetricQuery::new("Long Term Debt")
            .with_fallbacks(&["Total Long Term Debt", "Long Term Debt Noncurrent"])
            .with_fragments(&[&["long", "debt"], &["total", "debt"]]),
    },
];

const CASH_FLOW_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "operating_cash_flow",
        query: MetricQuery::new("Operating Cash Flow")
            .with_fallbacks(&[
                "Cash Flow From Operating Activities",
                "Net Cash Provided By Operating Activities",
                "Total Cash From Operating Activities",
            ])
            .with_fragments(&[&["cash", "flow", "operating"], &["operating", "activities"]]),
    },
    FieldSpec {
        name: "capital_expenditure",
        query: MetricQuery::new("Capital Expenditure")
            .with_fallbacks(&[
                "Capital Expenditures",
                "Net Change In Property, Plant, And Equipment",
                "CapEx",
            ])
            .with_fragments(&[&["property", "plant", "equipment"], &["capital", "expenditure"]]),
    },
];

/// Parse a period label into a fiscal year.
///
/// Accepts bare years, ISO and US dates, RFC 3339 timestamps and `FY2023`.
pub fn parse_fiscal_year(label: &str) -> Option<i32> {
    let trimmed = label.trim();
    let stripped = trimmed
        .strip_prefix("FY")
        .or_else(|| trimmed.strip_prefix("fy"))
        .map(str::trim)
        .unwrap_or(trimmed);

    let year = if stripped.len() == 4 && stripped.chars().all(|c| c.is_ascii_digit()) {
        stripped.parse::<i32>().ok()
    } else if let Ok(ts) = DateTime::parse_from_rfc3339(stripped) {
        Some(ts.year())
    } else {
        ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(stripped, fmt).ok())
            .map(|d| d.year())
    };

    year.filter(|y| (1900..=2200).contains(y))
}

const MISSING_TOKENS: &[&str] = &["", "-", "—", "–", "n/a", "na", "nan", "none", "null"];

/// Coerce a raw cell to a finite number; anything unparseable is missing.
pub fn parse_number(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(v) => Some(*v).filter(|v| v.is_finite()),
        RawCell::Empty => None,
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if MISSING_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
                return None;
            }
            let (negative, body) = match trimmed
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
            {
                Some(inner) => (true, inner),
                None => (false, trimmed),
            };
            let cleaned: String = body
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '€' | '£') && !c.is_whitespace())
                .collect();
            let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
            Some(if negative { -value.abs() } else { value })
        }
    }
}

/// Decide which axis carries the periods. Ties favour columns.
pub fn detect_orientation(table: &RawTable) -> Orientation {
    match table.orientation {
        Orientation::Detect => {
            let count = |labels: &[String]| {
                labels
                    .iter()
                    .filter(|l| parse_fiscal_year(l).is_some())
                    .count()
            };
            if count(&table.row_labels) > count(&table.column_labels) {
                Orientation::PeriodsAsRows
            } else {
                Orientation::PeriodsAsColumns
            }
        }
        fixed => fixed,
    }
}

/// A table reoriented so that each fiscal year maps onto one value per
/// field label.
struct YearGrid<'t> {
    fields: &'t [String],
    years: BTreeMap<i32, Vec<Option<f64>>>,
}

fn year_grid<'t>(
    statement: &'t RawStatement,
    kind: StatementKind,
    obs: &mut Observations,
) -> YearGrid<'t> {
    let table = &statement.table;
    let by_rows = detect_orientation(table) == Orientation::PeriodsAsRows;
    let (periods, fields) = if by_rows {
        (&table.row_labels, &table.column_labels)
    } else {
        (&table.column_labels, &table.row_labels)
    };
    let multiplier = statement.scale.multiplier();

    let mut years = BTreeMap::new();
    for (p, period) in periods.iter().enumerate() {
        let Some(year) = parse_fiscal_year(period) else {
            obs.info(
                ObservationCode::PeriodLabelSkipped,
                format!("{}: skipped unparseable period label '{}'", kind.label(), period),
            );
            continue;
        };
        if years.contains_key(&year) {
            obs.warn(
                ObservationCode::DuplicateYear,
                format!(
                    "{}: period '{}' repeats fiscal year {}, keeping the first",
                    kind.label(),
                    period,
                    year
                ),
            );
            continue;
        }
        let values = (0..fields.len())
            .map(|f| {
                let cell = if by_rows { table.cell(p, f) } else { table.cell(f, p) };
                parse_number(cell).map(|v| v * multiplier)
            })
            .collect();
        years.insert(year, values);
    }

    YearGrid {
        fields: fields.as_slice(),
        years,
    }
}

/// Resolve every field of `specs` and build one record per complete year.
/// `build` receives the scaled values in `specs` order.
fn extract<R>(
    statement: &RawStatement,
    kind: StatementKind,
    specs: &[FieldSpec],
    obs: &mut Observations,
    build: impl Fn(&[f64]) -> R,
) -> Result<CanonicalStatement<R>, ValuationError> {
    let grid = year_grid(statement, kind, obs);

    if grid.years.is_empty() {
        return Err(ValuationError::DataUnavailable {
            statement: StatementScope::Statement(kind),
            detail: "no parseable fiscal periods".to_string(),
            expected: vec!["fiscal year labels".to_string()],
            found: grid.fields.to_vec(),
        });
    }

    let mut columns = Vec::with_capacity(specs.len());
    for spec in specs {
        match resolve_query(grid.fields, &spec.query) {
            Some(resolution) => columns.push(resolution.index),
            None => {
                return Err(ValuationError::DataUnavailable {
                    statement: StatementScope::Statement(kind),
                    detail: format!("missing required field '{}'", spec.name),
                    expected: spec.query.candidates().map(str::to_string).collect(),
                    found: grid.fields.to_vec(),
                })
            }
        }
    }

    let mut canonical = CanonicalStatement::new(kind, statement.scale, statement.source.clone());
    for (year, values) in &grid.years {
        let picked: Option<Vec<f64>> = columns
            .iter()
            .map(|&c| values.get(c).copied().flatten())
            .collect();
        match picked {
            Some(picked) => {
                canonical.years.insert(*year, build(&picked));
            }
            None => {
                let missing: Vec<&str> = specs
                    .iter()
                    .zip(&columns)
                    .filter(|(_, &c)| values.get(c).copied().flatten().is_none())
                    .map(|(spec, _)| spec.name)
                    .collect();
                obs.warn(
                    ObservationCode::YearDropped,
                    format!(
                        "{}: dropped fiscal year {} (missing {})",
                        kind.label(),
                        year,
                        missing.join(", ")
                    ),
                );
            }
        }
    }

    if canonical.is_empty() {
        return Err(ValuationError::DataUnavailable {
            statement: StatementScope::Statement(kind),
            detail: "no fiscal year has every required field".to_string(),
            expected: specs.iter().map(|s| s.name.to_string()).collect(),
            found: grid.fields.to_vec(),
        });
    }

    Ok(canonical)
}

pub fn normalize_income(
    statement: &RawStatement,
    obs: &mut Observations,
) -> Result<IncomeStatement, ValuationError> {
    extract(statement, StatementKind::IncomeStatement, INCOME_FIELDS, obs, |v| {
        IncomeRecord {
            revenue: v[0],
            ebitda: v[1],
            shares_outstanding: v[2],
        }
    })
}

pub fn normalize_balance(
    statement: &RawStatement,
    obs: &mut Observations,
) -> Result<BalanceSheet, ValuationError> {
    extract(statement, StatementKind::BalanceSheet, BALANCE_FIELDS, obs, |v| {
        BalanceRecord {
            cash: v[0],
            long_term_debt: v[1],
        }
    })
}

/// Capital expenditure is stored as a magnitude regardless of the sign
/// convention the provider uses; FCF = OCF - |capex|.
pub fn normalize_cash_flow(
    statement: &RawStatement,
    obs: &mut Observations,
) -> Result<CashFlowStatement, ValuationError> {
    extract(statement, StatementKind::CashFlow, CASH_FLOW_FIELDS, obs, |v| {
        let capex = v[1].abs();
        CashFlowRecord {
            operating_cash_flow: v[0],
            capital_expenditure: capex,
            free_cash_flow: v[0] - capex,
        }
    })
}

/// Most recent year present in all three sets.
pub fn latest_common_year(
    income: &BTreeSet<i32>,
    balance: &BTreeSet<i32>,
    cash_flow: &BTreeSet<i32>,
) -> Option<i32> {
    income
        .iter()
        .rev()
        .find(|y| balance.contains(y) && cash_flow.contains(y))
        .copied()
}

fn year_list(years: &BTreeSet<i32>) -> String {
    years
        .iter()
        .map(|y| y.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize all three statements and pick the latest common fiscal year.
pub fn normalize(
    raw: &RawStatements,
    obs: &mut Observations,
) -> Result<NormalizedStatements, ValuationError> {
    let income = normalize_income(&raw.income, obs)?;
    let balance = normalize_balance(&raw.balance, obs)?;
    let cash_flow = normalize_cash_flow(&raw.cash_flow, obs)?;

    let income_years: BTreeSet<i32> = income.years.keys().copied().collect();
    let balance_years: BTreeSet<i32> = balance.years.keys().copied().collect();
    let cash_flow_years: BTreeSet<i32> = cash_flow.years.keys().copied().collect();

    let latest = latest_common_year(&income_years, &balance_years, &cash_flow_years).ok_or_else(
        || ValuationError::DataUnavailable {
            statement: StatementScope::AllStatements,
            detail: "no fiscal year is present in all three statements".to_string(),
            expected: vec!["one shared fiscal year".to_string()],
            found: vec![
                format!("income statement: {}", year_list(&income_years)),
                format!("balance sheet: {}", year_list(&balance_years)),
                format!("cash flow statement: {}", year_list(&cash_flow_years)),
            ],
        },
    )?;

    tracing::debug!("{}: latest common fiscal year {}", raw.ticker, latest);

    Ok(NormalizedStatements {
        income,
        balance,
        cash_flow,
        latest_common_year: latest,
    })
}
