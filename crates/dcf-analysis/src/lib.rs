//! Pure discounted-cash-flow analysis: statement normalization, growth
//! derivation and the two-stage valuation. No I/O happens here.

pub mod growth;
pub mod normalizer;
pub mod resolver;
pub mod valuation;

use valuation_core::{
    BaseData, BaseValuationInputs, DcfValuation, NormalizedStatements, Observations,
    RawStatements, ScenarioAssumptions, ScenarioValuation, StatementScope, ValuationConfig,
    ValuationError,
};

pub use growth::{cagr, derive_historical_growth, validate_growth_rate, validate_perpetual_growth_rate};
pub use normalizer::{latest_common_year, normalize};
pub use resolver::{resolve, MetricQuery};
pub use valuation::value;

pub const PROSPECTIVE_SCENARIO: &str = "prospective";
pub const HISTORICAL_SCENARIO: &str = "historical";

pub struct DcfAnalysisEngine {
    config: ValuationConfig,
}

impl DcfAnalysisEngine {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Pull the valuation scalars for the latest common fiscal year.
    pub fn base_inputs(
        &self,
        statements: &NormalizedStatements,
        discount_rate: Option<f64>,
    ) -> Result<BaseValuationInputs, ValuationError> {
        let year = statements.latest_common_year;
        let missing = |what: &str| ValuationError::DataUnavailable {
            statement: StatementScope::AllStatements,
            detail: format!("{} missing for fiscal year {}", what, year),
            expected: vec![year.to_string()],
            found: Vec::new(),
        };

        let income = statements.income.get(year).ok_or_else(|| missing("income record"))?;
        let balance = statements.balance.get(year).ok_or_else(|| missing("balance record"))?;
        let cash_flow = statements
            .cash_flow
            .get(year)
            .ok_or_else(|| missing("cash flow record"))?;

        Ok(BaseValuationInputs {
            base_fcf: cash_flow.free_cash_flow,
            total_debt: balance.long_term_debt,
            cash: balance.cash,
            shares_outstanding: income.shares_outstanding,
            discount_rate: discount_rate.unwrap_or(self.config.default_discount_rate),
        })
    }

    fn scenario(
        &self,
        name: &str,
        inputs: &BaseValuationInputs,
        assumptions: ScenarioAssumptions,
        obs: &mut Observations,
    ) -> Result<ScenarioValuation, ValuationError> {
        let out = value(inputs, &assumptions, self.config.projection_years, obs)?;
        Ok(ScenarioValuation {
            name: name.to_string(),
            fcf_growth: assumptions.fcf_growth,
            perpetual_growth: assumptions.perpetual_growth,
            intrinsic_value_per_share: out.value_per_share,
            enterprise_value: out.enterprise_value,
            equity_value: out.equity_value,
        })
    }

    /// Value already-normalized statements under both scenarios.
    pub fn value_statements(
        &self,
        ticker: &str,
        statements: &NormalizedStatements,
        discount_rate: Option<f64>,
        obs: &mut Observations,
    ) -> Result<DcfValuation, ValuationError> {
        let inputs = self.base_inputs(statements, discount_rate)?;

        let prospective = growth::validate_assumptions(
            self.config.prospective,
            PROSPECTIVE_SCENARIO,
            &self.config,
            obs,
        );
        let historical = derive_historical_growth(
            &statements.cash_flow.series(|r| r.free_cash_flow),
            &statements.income.series(|r| r.ebitda),
            &self.config,
            obs,
        );

        let scenario_prospective = self.scenario(PROSPECTIVE_SCENARIO, &inputs, prospective, obs)?;
        let scenario_historical = self.scenario(HISTORICAL_SCENARIO, &inputs, historical, obs)?;

        tracing::info!(
            "{}: prospective {:.2}/share, historical {:.2}/share (FY{})",
            ticker,
            scenario_prospective.intrinsic_value_per_share,
            scenario_historical.intrinsic_value_per_share,
            statements.latest_common_year
        );

        Ok(DcfValuation {
            success: true,
            base_data: BaseData {
                ticker: ticker.to_string(),
                latest_year: statements.latest_common_year,
                base_fcf: inputs.base_fcf,
                total_debt: inputs.total_debt,
                cash: inputs.cash,
                shares_outstanding: inputs.shares_outstanding,
                discount_rate: inputs.discount_rate,
            },
            scenario_prospective,
            scenario_historical,
            observations: obs.as_slice().to_vec(),
        })
    }

    /// Normalize raw statements and value them. Observations made along the
    /// way are kept in `obs` whether or not the run succeeds.
    pub fn evaluate(
        &self,
        raw: &RawStatements,
        discount_rate: Option<f64>,
        obs: &mut Observations,
    ) -> Result<DcfValuation, ValuationError> {
        let statements = normalize(raw, obs)?;
        self.value_statements(&raw.ticker, &statements, discount_rate, obs)
    }
}

impl Default for DcfAnalysisEngine {
    fn default() -> Self {
        Self::new(ValuationConfig::default())
    }
}
