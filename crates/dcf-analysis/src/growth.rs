use valuation_core::{ObservationCode, Observations, ScenarioAssumptions, ValuationConfig};

/// Compound annual growth rate over `periods` compounding steps.
///
/// `None` when either endpoint is non-positive or non-finite, or when there
/// are no steps to compound over.
pub fn cagr(start: f64, end: f64, periods: u32) -> Option<f64> {
    if periods == 0 || !start.is_finite() || !end.is_finite() || start <= 0.0 || end <= 0.0 {
        return None;
    }
    let rate = (end / start).powf(1.0 / periods as f64) - 1.0;
    rate.is_finite().then_some(rate)
}

/// CAGR between the oldest and newest observation of an ascending
/// `(year, value)` series. The step count is the year span, so gaps in the
/// series do not inflate the rate.
pub fn series_cagr(series: &[(i32, f64)]) -> Option<f64> {
    let (first_year, first) = *series.first()?;
    let (last_year, last) = *series.last()?;
    let span = u32::try_from(last_year - first_year).ok()?;
    cagr(first, last, span)
}

fn clamp_rate(
    rate: f64,
    name: &str,
    min: f64,
    max: f64,
    obs: &mut Observations,
) -> f64 {
    if rate < min {
        obs.warn(
            ObservationCode::GrowthRateClamped,
            format!("{} {:.2}% below minimum, clamped to {:.2}%", name, rate * 100.0, min * 100.0),
        );
        min
    } else if rate > max {
        obs.warn(
            ObservationCode::GrowthRateClamped,
            format!("{} {:.2}% above maximum, clamped to {:.2}%", name, rate * 100.0, max * 100.0),
        );
        max
    } else {
        rate
    }
}

/// Clamp a period growth rate into `[min_growth_rate, max_growth_rate]`.
pub fn validate_growth_rate(
    rate: f64,
    name: &str,
    config: &ValuationConfig,
    obs: &mut Observations,
) -> f64 {
    clamp_rate(rate, name, config.min_growth_rate, config.max_growth_rate, obs)
}

/// Clamp a perpetual growth rate into
/// `[min_perpetual_growth, max_perpetual_growth]`.
pub fn validate_perpetual_growth_rate(
    rate: f64,
    name: &str,
    config: &ValuationConfig,
    obs: &mut Observations,
) -> f64 {
    clamp_rate(
        rate,
        name,
        config.min_perpetual_growth,
        config.max_perpetual_growth,
        obs,
    )
}

/// Run both rates of a scenario through their bands.
pub fn validate_assumptions(
    assumptions: ScenarioAssumptions,
    scenario: &str,
    config: &ValuationConfig,
    obs: &mut Observations,
) -> ScenarioAssumptions {
    ScenarioAssumptions {
        fcf_growth: validate_growth_rate(
            assumptions.fcf_growth,
            &format!("{} FCF growth", scenario),
            config,
            obs,
        ),
        perpetual_growth: validate_perpetual_growth_rate(
            assumptions.perpetual_growth,
            &format!("{} perpetual growth", scenario),
            config,
            obs,
        ),
    }
}

/// Historical scenario assumptions from ascending FCF and EBITDA series.
///
/// FCF growth is the FCF CAGR, falling back to the prospective FCF rate.
/// Perpetual growth is the EBITDA CAGR, falling back to the prospective
/// perpetual rate and never exceeding it.
pub fn derive_historical_growth(
    fcf_series: &[(i32, f64)],
    ebitda_series: &[(i32, f64)],
    config: &ValuationConfig,
    obs: &mut Observations,
) -> ScenarioAssumptions {
    let prospective = config.prospective;

    let fcf_growth = match series_cagr(fcf_series) {
        Some(rate) => rate,
        None => {
            obs.warn(
                ObservationCode::GrowthRateFallback,
                format!(
                    "historical FCF growth not derivable from {} observation(s), using {:.2}%",
                    fcf_series.len(),
                    prospective.fcf_growth * 100.0
                ),
            );
            prospective.fcf_growth
        }
    };

    let ebitda_growth = match series_cagr(ebitda_series) {
        Some(rate) => rate,
        None => {
            obs.warn(
                ObservationCode::GrowthRateFallback,
                format!(
                    "historical EBITDA growth not derivable from {} observation(s), using {:.2}%",
                    ebitda_series.len(),
                    prospective.perpetual_growth * 100.0
                ),
            );
            prospective.perpetual_growth
        }
    };

    let perpetual_growth = if ebitda_growth > prospective.perpetual_growth {
        obs.warn(
            ObservationCode::GrowthRateClamped,
            format!(
                "historical perpetual growth {:.2}% capped at prospective {:.2}%",
                ebitda_growth * 100.0,
                prospective.perpetual_growth * 100.0
            ),
        );
        prospective.perpetual_growth
    } else {
        ebitda_growth
    };

    validate_assumptions(
        ScenarioAssumptions {
            fcf_growth,
            perpetual_growth,
        },
        "historical",
        config,
        obs,
    )
}
