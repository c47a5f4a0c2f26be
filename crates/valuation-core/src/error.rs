use thiserror::Error;

use crate::StatementKind;

/// Failure kinds of a valuation request.
///
/// Every variant is fatal for the request that raised it. None of them is
/// ever replaced by a default value for a quantity that feeds the
/// discounting formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// The raw statement fetch failed or came back empty.
    #[error("Provider unavailable for {ticker}: {reason}")]
    ProviderUnavailable { ticker: String, reason: String },

    /// A required field or a common fiscal year could not be found.
    #[error("Data unavailable in {statement}: {detail} (expected: {}; found: {})", .expected.join(", "), .found.join(", "))]
    DataUnavailable {
        statement: StatementScope,
        detail: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A precondition of the valuation engine does not hold.
    #[error("Invalid valuation input: {quantity} = {value} ({reason})")]
    InvalidValuationInput {
        quantity: String,
        value: f64,
        reason: String,
    },

    /// An output came out NaN although the inputs were valid.
    #[error("Computation integrity violated: {quantity} = {value}")]
    ComputationIntegrity { quantity: String, value: f64 },
}

/// A persistence collaborator could not store a record.
#[derive(Error, Debug)]
#[error("History write failed: {0}")]
pub struct HistoryError(pub String);

/// Which part of the statement set a `DataUnavailable` failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementScope {
    Statement(StatementKind),
    AllStatements,
}

impl std::fmt::Display for StatementScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementScope::Statement(kind) => write!(f, "{}", kind.label()),
            StatementScope::AllStatements => write!(f, "all statements"),
        }
    }
}

/// Stable error category, surfaced in error results and mapped to HTTP
/// status codes by the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ProviderUnavailable,
    DataUnavailable,
    InvalidValuationInput,
    ComputationIntegrity,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ProviderUnavailable => "provider_unavailable",
            ErrorCategory::DataUnavailable => "data_unavailable",
            ErrorCategory::InvalidValuationInput => "invalid_valuation_input",
            ErrorCategory::ComputationIntegrity => "computation_integrity",
        }
    }
}

impl ValuationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValuationError::ProviderUnavailable { .. } => ErrorCategory::ProviderUnavailable,
            ValuationError::DataUnavailable { .. } => ErrorCategory::DataUnavailable,
            ValuationError::InvalidValuationInput { .. } => ErrorCategory::InvalidValuationInput,
            ValuationError::ComputationIntegrity { .. } => ErrorCategory::ComputationIntegrity,
        }
    }

    pub fn provider(ticker: &str, reason: impl Into<String>) -> Self {
        ValuationError::ProviderUnavailable {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(quantity: &str, value: f64, reason: impl Into<String>) -> Self {
        ValuationError::InvalidValuationInput {
            quantity: quantity.to_string(),
            value,
            reason: reason.into(),
        }
    }

    /// Whether a caller should be pointed at tickers known to work.
    pub fn suggests_alternatives(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ProviderUnavailable | ErrorCategory::DataUnavailable
        )
    }
}
