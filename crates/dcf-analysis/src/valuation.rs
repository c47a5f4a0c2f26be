use valuation_core::{
    BaseValuationInputs, DcfOutput, ObservationCode, Observations, ScenarioAssumptions,
    ValuationError,
};

fn require_finite(quantity: &str, value: f64) -> Result<(), ValuationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValuationError::invalid_input(quantity, value, "must be a finite number"))
    }
}

fn check_output(quantity: &str, value: f64) -> Result<f64, ValuationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::ComputationIntegrity {
            quantity: quantity.to_string(),
            value,
        })
    }
}

/// Two-stage discounted cash flow.
///
/// Free cash flow grows at `fcf_growth` for `projection_years`, each year
/// discounted at the discount rate. A Gordon terminal value on the final
/// year's FCF grows at `perpetual_growth` and is discounted back the same
/// number of years. Net debt is subtracted to reach equity value.
pub fn value(
    inputs: &BaseValuationInputs,
    assumptions: &ScenarioAssumptions,
    projection_years: u32,
    obs: &mut Observations,
) -> Result<DcfOutput, ValuationError> {
    require_finite("base_fcf", inputs.base_fcf)?;
    require_finite("total_debt", inputs.total_debt)?;
    require_finite("cash", inputs.cash)?;
    require_finite("shares_outstanding", inputs.shares_outstanding)?;
    require_finite("discount_rate", inputs.discount_rate)?;
    require_finite("fcf_growth", assumptions.fcf_growth)?;
    require_finite("perpetual_growth", assumptions.perpetual_growth)?;

    if inputs.base_fcf <= 0.0 {
        return Err(ValuationError::invalid_input(
            "base_fcf",
            inputs.base_fcf,
            "free cash flow must be positive",
        ));
    }
    if inputs.shares_outstanding <= 0.0 {
        return Err(ValuationError::invalid_input(
            "shares_outstanding",
            inputs.shares_outstanding,
            "share count must be positive",
        ));
    }
    if inputs.discount_rate <= -1.0 {
        return Err(ValuationError::invalid_input(
            "discount_rate",
            inputs.discount_rate,
            "discount factor must stay positive",
        ));
    }
    if inputs.discount_rate <= assumptions.perpetual_growth {
        return Err(ValuationError::invalid_input(
            "discount_rate",
            inputs.discount_rate,
            format!(
                "must exceed perpetual growth rate {}",
                assumptions.perpetual_growth
            ),
        ));
    }
    if projection_years == 0 {
        return Err(ValuationError::invalid_input(
            "projection_years",
            0.0,
            "at least one projection year is required",
        ));
    }
    let horizon = i32::try_from(projection_years).map_err(|_| {
        ValuationError::invalid_input(
            "projection_years",
            projection_years as f64,
            "projection horizon too long",
        )
    })?;

    let r = inputs.discount_rate;
    let g = assumptions.fcf_growth;
    let pg = assumptions.perpetual_growth;

    let mut pv_explicit = 0.0;
    let mut final_fcf = inputs.base_fcf;
    for t in 1..=horizon {
        final_fcf = inputs.base_fcf * (1.0 + g).powi(t);
        pv_explicit += final_fcf / (1.0 + r).powi(t);
    }

    let terminal_value = final_fcf * (1.0 + pg) / (r - pg);
    let pv_terminal = terminal_value / (1.0 + r).powi(horizon);

    let enterprise_value = check_output("enterprise_value", pv_explicit + pv_terminal)?;
    let equity_value = check_output(
        "equity_value",
        enterprise_value - inputs.total_debt + inputs.cash,
    )?;
    let value_per_share = check_output("value_per_share", equity_value / inputs.shares_outstanding)?;

    if equity_value < 0.0 {
        obs.warn(
            ObservationCode::NegativeEquity,
            format!(
                "equity value {:.0} is negative: debt exceeds enterprise value plus cash",
                equity_value
            ),
        );
    }

    Ok(DcfOutput {
        value_per_share,
        enterprise_value,
        equity_value,
    })
}
