use serde::{Deserialize, Serialize};

use crate::{ScenarioAssumptions, ValuationError};

pub const DEFAULT_DISCOUNT_RATE: f64 = 0.0863;
pub const DEFAULT_PROJECTION_YEARS: u32 = 5;

/// Engine constants. Passed explicitly into every component that needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    pub default_discount_rate: f64,
    pub projection_years: u32,
    /// Fixed assumptions of the prospective scenario.
    pub prospective: ScenarioAssumptions,
    pub min_growth_rate: f64,
    pub max_growth_rate: f64,
    pub min_perpetual_growth: f64,
    pub max_perpetual_growth: f64,
    /// Tickers known to resolve on the configured providers.
    pub suggested_alternatives: Vec<String>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            default_discount_rate: DEFAULT_DISCOUNT_RATE,
            projection_years: DEFAULT_PROJECTION_YEARS,
            prospective: ScenarioAssumptions {
                fcf_growth: 0.05,
                perpetual_growth: 0.025,
            },
            min_growth_rate: -0.50,
            max_growth_rate: 1.00,
            min_perpetual_growth: 0.0,
            max_perpetual_growth: 0.05,
            suggested_alternatives: ["AAPL", "MSFT", "GOOGL", "AMZN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ValuationConfig {
    pub fn with_discount_rate(mut self, rate: f64) -> Self {
        self.default_discount_rate = rate;
        self
    }

    /// Reject bands that cannot be satisfied or a prospective scenario that
    /// falls outside them.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.projection_years == 0 {
            return Err(ValuationError::invalid_input(
                "projection_years",
                0.0,
                "at least one projection year is required",
            ));
        }
        if !(self.min_growth_rate < self.max_growth_rate) {
            return Err(ValuationError::invalid_input(
                "min_growth_rate",
                self.min_growth_rate,
                format!("must be below max_growth_rate {}", self.max_growth_rate),
            ));
        }
        if !(self.min_perpetual_growth <= self.max_perpetual_growth) {
            return Err(ValuationError::invalid_input(
                "min_perpetual_growth",
                self.min_perpetual_growth,
                format!("must not exceed max_perpetual_growth {}", self.max_perpetual_growth),
            ));
        }
        let p = self.prospective;
        if p.fcf_growth < self.min_growth_rate || p.fcf_growth > self.max_growth_rate {
            return Err(ValuationError::invalid_input(
                "prospective.fcf_growth",
                p.fcf_growth,
                "outside the period growth band",
            ));
        }
        if p.perpetual_growth < self.min_perpetual_growth
            || p.perpetual_growth > self.max_perpetual_growth
        {
            return Err(ValuationError::invalid_input(
                "prospective.perpetual_growth",
                p.perpetual_growth,
                "outside the perpetual growth band",
            ));
        }
        if !(self.default_discount_rate > p.perpetual_growth) {
            return Err(ValuationError::invalid_input(
                "default_discount_rate",
                self.default_discount_rate,
                "must exceed the prospective perpetual growth rate",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ValuationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.projection_years, 5);
        assert!((config.default_discount_rate - 0.0863).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_band_rejected() {
        let config = ValuationConfig {
            min_growth_rate: 0.5,
            max_growth_rate: 0.1,
            ..ValuationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discount_rate_below_perpetual_rejected() {
        let config = ValuationConfig::default().with_discount_rate(0.02);
        assert!(config.validate().is_err());
    }
}
