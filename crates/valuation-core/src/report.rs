use serde::{Deserialize, Serialize};

use crate::{ErrorCategory, NormalizedStatements, ValuationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationLevel {
    Info,
    Warning,
}

/// What kind of adjustment or anomaly an observation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationCode {
    /// A growth rate fell outside its band and was clamped.
    GrowthRateClamped,
    /// A historical growth rate could not be derived and the prospective
    /// rate was used instead.
    GrowthRateFallback,
    /// A fiscal year was dropped because a required field was missing.
    YearDropped,
    /// A period label could not be parsed into a fiscal year.
    PeriodLabelSkipped,
    /// Two periods mapped onto the same fiscal year.
    DuplicateYear,
    /// Equity value came out negative (over-levered company).
    NegativeEquity,
}

/// One structured diagnostic, returned alongside the result so callers can
/// tell "succeeded cleanly" from "succeeded with adjustments".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub level: ObservationLevel,
    pub code: ObservationCode,
    pub message: String,
}

/// Collects observations for one request and mirrors them to `tracing`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    items: Vec<Observation>,
}

impl Observations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: ObservationCode, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?code, "{}", message);
        self.items.push(Observation {
            level: ObservationLevel::Warning,
            code,
            message,
        });
    }

    pub fn info(&mut self, code: ObservationCode, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(?code, "{}", message);
        self.items.push(Observation {
            level: ObservationLevel::Info,
            code,
            message,
        });
    }

    pub fn contains(&self, code: ObservationCode) -> bool {
        self.items.iter().any(|o| o.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Observation> {
        self.items
    }
}

/// Inputs shared by both scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseData {
    pub ticker: String,
    pub latest_year: i32,
    pub base_fcf: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub shares_outstanding: f64,
    pub discount_rate: f64,
}

/// One valued scenario together with the assumptions it used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioValuation {
    pub name: String,
    pub fcf_growth: f64,
    pub perpetual_growth: f64,
    pub intrinsic_value_per_share: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
}

/// Successful two-scenario valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfValuation {
    pub success: bool,
    pub base_data: BaseData,
    pub scenario_prospective: ScenarioValuation,
    pub scenario_historical: ScenarioValuation,
    pub observations: Vec<Observation>,
}

/// Uniform error record returned instead of a valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfFailure {
    pub success: bool,
    pub error_message: String,
    pub error_category: ErrorCategory,
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_alternatives: Option<Vec<String>>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl DcfFailure {
    pub fn from_error(
        ticker: &str,
        error: &ValuationError,
        alternatives: &[String],
        observations: Vec<Observation>,
    ) -> Self {
        let suggested_alternatives = if error.suggests_alternatives() && !alternatives.is_empty() {
            Some(alternatives.to_vec())
        } else {
            None
        };
        Self {
            success: false,
            error_message: error.to_string(),
            error_category: error.category(),
            ticker: ticker.to_string(),
            suggested_alternatives,
            observations,
        }
    }
}

/// What `run_dcf` hands back: a valuation or an error record, never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DcfReport {
    Success(DcfValuation),
    Failure(DcfFailure),
}

impl DcfReport {
    pub fn is_success(&self) -> bool {
        matches!(self, DcfReport::Success(_))
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        match self {
            DcfReport::Success(_) => None,
            DcfReport::Failure(f) => Some(f.error_category),
        }
    }
}

/// Canonical statements for display, or the same error record as `run_dcf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinancialsReport {
    Success {
        success: bool,
        ticker: String,
        statements: NormalizedStatements,
        observations: Vec<Observation>,
    },
    Failure(DcfFailure),
}
