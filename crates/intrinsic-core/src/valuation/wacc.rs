use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::beta::{compute_levered_beta, EstimationWindow};
use super::capital::{capital_structure, effective_tax_rate, pre_tax_cost_of_debt};
use super::CompanyData;
use crate::error::IntrinsicError;
use crate::market_data::{Frequency, PriceSeries};
use crate::stats;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::IntrinsicResult;

/// Component inputs for the WACC blend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccInput {
    /// Risk-free rate (e.g. 10-year government bond yield)
    pub risk_free_rate: Rate,
    /// Realised market return minus the risk-free rate; may be negative
    pub equity_risk_premium: Rate,
    /// Industry (peer-median) unlevered beta
    pub unlevered_beta: Decimal,
    /// The firm's own debt-to-equity ratio, used to re-lever
    pub debt_to_equity: Decimal,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    /// Effective tax rate
    pub tax_rate: Rate,
    /// Weight of debt in capital structure (market value basis)
    pub debt_weight: Rate,
    /// Weight of equity in capital structure (market value basis)
    pub equity_weight: Rate,
    /// Small-cap / size premium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_premium: Option<Rate>,
    /// Country risk premium for emerging markets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_risk_premium: Option<Rate>,
    /// Company-specific / alpha risk premium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_risk_premium: Option<Rate>,
}

/// Output of the WACC blend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccOutput {
    /// Weighted average cost of capital
    pub wacc: Rate,
    /// Cost of equity via single-factor CAPM
    pub cost_of_equity: Rate,
    /// After-tax cost of debt
    pub after_tax_cost_of_debt: Rate,
    /// Industry beta re-levered to the firm's capital structure
    pub relevered_beta: Decimal,
}

/// Every intermediate of a data-driven WACC estimate, for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccBreakdown {
    pub ticker: String,
    pub risk_free_rate: Rate,
    pub market_return: Rate,
    pub equity_risk_premium: Rate,
    /// The firm's own regression beta (reported, not used in the blend)
    pub levered_beta: Decimal,
    pub industry_unlevered_beta: Decimal,
    pub relevered_beta: Decimal,
    pub cost_of_equity: Rate,
    pub cost_of_debt_pre_tax: Rate,
    pub cost_of_debt_after_tax: Rate,
    pub average_market_cap: Money,
    pub average_total_debt: Money,
    pub debt_to_equity: Decimal,
    pub equity_weight: Rate,
    pub debt_weight: Rate,
    pub tax_rate: Rate,
    pub wacc: Rate,
    pub warnings: Vec<String>,
}

/// Blend cost of equity and after-tax cost of debt.
///
/// Beta_L = Beta_U * (1 + (1 - t) * D/E)
/// Ke = Rf + Beta_L * ERP + size_premium + country_risk + specific_risk
/// Kd_at = Kd * (1 - t)
/// WACC = Ke * We + Kd_at * Wd
///
/// Rejects out-of-range components supplied by the caller. `estimate_wacc`
/// blends measured components without these checks and warns instead.
pub fn calculate_wacc(input: &WaccInput) -> IntrinsicResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();

    validate_wacc_input(input)?;

    let weight_sum = input.debt_weight + input.equity_weight;
    if (weight_sum - Decimal::ONE).abs() > dec!(0.0001) {
        return Err(IntrinsicError::InvalidInput {
            field: "debt_weight + equity_weight".into(),
            reason: format!("Capital structure weights must sum to 1.0, got {weight_sum}"),
        });
    }

    let (output, warnings) = blend(input);
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "WACC via CAPM with Hamada re-levered industry beta",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Estimate WACC for one company from its data, the market index and the
/// peer-median unlevered beta.
pub fn estimate_wacc(
    company: &CompanyData,
    market_prices: &PriceSeries,
    industry_unlevered_beta: Decimal,
    window: &EstimationWindow,
    risk_free_rate: Rate,
    capital_structure_years: usize,
) -> IntrinsicResult<WaccBreakdown> {
    let statements = &company.statements;

    let structure = capital_structure(
        &company.prices,
        company.profile.shares_outstanding,
        statements,
        capital_structure_years,
    )?;
    let tax_rate = effective_tax_rate(statements, capital_structure_years)?;
    let cost_of_debt = pre_tax_cost_of_debt(statements, capital_structure_years)?;
    let market_return = annualised_market_return(market_prices, window.frequency)?;
    let equity_risk_premium = market_return - risk_free_rate;
    let levered_beta = compute_levered_beta(&company.prices, market_prices, window.frequency)?;

    let input = WaccInput {
        risk_free_rate,
        equity_risk_premium,
        unlevered_beta: industry_unlevered_beta,
        debt_to_equity: structure.debt_to_equity,
        cost_of_debt,
        tax_rate,
        debt_weight: structure.debt_weight(),
        equity_weight: structure.equity_weight(),
        size_premium: None,
        country_risk_premium: None,
        specific_risk_premium: None,
    };
    let (output, mut warnings) = blend(&input);
    warnings.extend(measurement_warnings(&input));
    if structure.average_total_debt.is_zero() {
        warnings.push("No debt over the window; cost of debt set to zero".into());
    }

    debug!(ticker = company.ticker(), wacc = %output.wacc, "wacc estimated");

    Ok(WaccBreakdown {
        ticker: company.ticker().to_string(),
        risk_free_rate,
        market_return,
        equity_risk_premium,
        levered_beta,
        industry_unlevered_beta,
        relevered_beta: output.relevered_beta,
        cost_of_equity: output.cost_of_equity,
        cost_of_debt_pre_tax: cost_of_debt,
        cost_of_debt_after_tax: output.after_tax_cost_of_debt,
        average_market_cap: structure.average_market_cap,
        average_total_debt: structure.average_total_debt,
        debt_to_equity: structure.debt_to_equity,
        equity_weight: input.equity_weight,
        debt_weight: input.debt_weight,
        tax_rate,
        wacc: output.wacc,
        warnings,
    })
}

/// Mean periodic log return of the index, annualised.
pub fn annualised_market_return(
    market_prices: &PriceSeries,
    frequency: Frequency,
) -> IntrinsicResult<Rate> {
    let returns: Vec<Decimal> = market_prices
        .log_returns(frequency)?
        .into_iter()
        .map(|(_, r)| r)
        .collect();
    let mean = stats::mean(&returns).ok_or_else(|| {
        IntrinsicError::InsufficientData(format!(
            "{}: no index returns in window for the equity risk premium",
            market_prices.symbol
        ))
    })?;
    Ok(mean * frequency.periods_per_year())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// CAPM build-up and weighted blend, with the advisory warnings.
///
/// Performs no range checks: measured inputs (tax rates from loss years, a
/// non-positive peer beta) still produce a WACC.
fn blend(input: &WaccInput) -> (WaccOutput, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let relevered_beta = relever_beta(input.unlevered_beta, input.tax_rate, input.debt_to_equity);
    let premiums = input.size_premium.unwrap_or(Decimal::ZERO)
        + input.country_risk_premium.unwrap_or(Decimal::ZERO)
        + input.specific_risk_premium.unwrap_or(Decimal::ZERO);
    let cost_of_equity =
        input.risk_free_rate + relevered_beta * input.equity_risk_premium + premiums;
    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);
    let wacc = cost_of_equity * input.equity_weight + after_tax_cost_of_debt * input.debt_weight;

    if input.equity_risk_premium < Decimal::ZERO {
        warnings.push(format!(
            "Negative equity risk premium ({}): the market under-performed the risk-free rate over the window",
            input.equity_risk_premium
        ));
    }
    if relevered_beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({relevered_beta}): verify market data; betas above 3.0 are unusual"
        ));
    }
    if cost_of_equity < input.risk_free_rate {
        warnings.push(format!(
            "Cost of equity ({cost_of_equity}) is below the risk-free rate"
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!(
            "WACC of {wacc} exceeds 20%; appropriate for high-risk situations only"
        ));
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        relevered_beta,
    };
    (output, warnings)
}

/// Warnings for measured components that `calculate_wacc` would reject.
fn measurement_warnings(input: &WaccInput) -> Vec<String> {
    let mut warnings = Vec::new();
    if input.unlevered_beta <= Decimal::ZERO {
        warnings.push(format!(
            "Non-positive industry unlevered beta ({}); cost of equity is at or below the risk-free rate",
            input.unlevered_beta
        ));
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        warnings.push(format!(
            "Effective tax rate {} is outside [0, 1] (loss years or tax credits)",
            input.tax_rate
        ));
    }
    if input.debt_to_equity < Decimal::ZERO {
        warnings.push(format!("Negative debt-to-equity ({})", input.debt_to_equity));
    }
    if input.cost_of_debt < Decimal::ZERO {
        warnings.push(format!("Negative cost of debt ({})", input.cost_of_debt));
    }
    warnings
}

fn validate_wacc_input(input: &WaccInput) -> IntrinsicResult<()> {
    if input.unlevered_beta <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "unlevered_beta".into(),
            reason: "Unlevered beta must be positive".into(),
        });
    }
    if input.debt_to_equity < Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "debt_to_equity".into(),
            reason: "D/E ratio cannot be negative".into(),
        });
    }
    if input.cost_of_debt < Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "cost_of_debt".into(),
            reason: "Cost of debt cannot be negative".into(),
        });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(IntrinsicError::InvalidInput {
            field: "tax_rate".into(),
            reason: format!("Tax rate must be between 0 and 1, got {}", input.tax_rate),
        });
    }
    if input.debt_weight < Decimal::ZERO || input.equity_weight < Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "debt_weight / equity_weight".into(),
            reason: "Capital structure weights cannot be negative".into(),
        });
    }
    Ok(())
}

/// Unlever a beta using the Hamada equation.
///
/// Beta_U = Beta_L / (1 + (1 - t) * D/E)
pub fn unlever_beta(
    levered_beta: Decimal,
    tax_rate: Rate,
    debt_equity: Decimal,
) -> IntrinsicResult<Decimal> {
    let denom = Decimal::ONE + (Decimal::ONE - tax_rate) * debt_equity;
    if denom.is_zero() {
        return Err(IntrinsicError::DivisionByZero {
            context: "Hamada unlever denominator".into(),
        });
    }
    Ok(levered_beta / denom)
}

/// Re-lever a beta using the Hamada equation.
///
/// Beta_L = Beta_U * (1 + (1 - t) * D/E)
pub fn relever_beta(unlevered_beta: Decimal, tax_rate: Rate, debt_equity: Decimal) -> Decimal {
    unlevered_beta * (Decimal::ONE + (Decimal::ONE - tax_rate) * debt_equity)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_input() -> WaccInput {
        WaccInput {
            risk_free_rate: dec!(0.072),
            equity_risk_premium: dec!(0.05),
            unlevered_beta: dec!(0.80),
            debt_to_equity: dec!(0.25),
            cost_of_debt: dec!(0.09),
            tax_rate: dec!(0.25),
            debt_weight: dec!(0.20),
            equity_weight: dec!(0.80),
            size_premium: None,
            country_risk_premium: None,
            specific_risk_premium: None,
        }
    }

    #[test]
    fn test_basic_wacc() {
        let result = calculate_wacc(&sample_input()).unwrap();
        let out = &result.result;

        // Beta_L = 0.80 * (1 + 0.75 * 0.25) = 0.80 * 1.1875 = 0.95
        assert_eq!(out.relevered_beta, dec!(0.95));
        // Ke = 0.072 + 0.95 * 0.05 = 0.1195
        assert_eq!(out.cost_of_equity, dec!(0.1195));
        // Kd_at = 0.09 * 0.75 = 0.0675
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.0675));
        // WACC = 0.1195 * 0.8 + 0.0675 * 0.2 = 0.0956 + 0.0135 = 0.1091
        assert_eq!(out.wacc, dec!(0.1091));
    }

    #[test]
    fn test_premiums_add_to_cost_of_equity() {
        let mut input = sample_input();
        input.size_premium = Some(dec!(0.02));
        input.country_risk_premium = Some(dec!(0.01));
        let out = calculate_wacc(&input).unwrap().result;
        assert_eq!(out.cost_of_equity, dec!(0.1495));
    }

    #[test]
    fn test_negative_erp_is_a_warning_not_an_error() {
        let mut input = sample_input();
        input.equity_risk_premium = dec!(-0.01);
        let result = calculate_wacc(&input).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Negative equity risk premium")));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut input = sample_input();
        input.debt_weight = dec!(0.50);
        match calculate_wacc(&input).unwrap_err() {
            IntrinsicError::InvalidInput { field, .. } => assert!(field.contains("weight")),
            e => panic!("Expected InvalidInput, got {e:?}"),
        }
    }

    #[test]
    fn test_tax_rate_out_of_range_rejected() {
        let mut input = sample_input();
        input.tax_rate = dec!(1.2);
        assert!(calculate_wacc(&input).is_err());
    }

    #[test]
    fn test_zero_unlevered_beta_rejected() {
        let mut input = sample_input();
        input.unlevered_beta = Decimal::ZERO;
        assert!(calculate_wacc(&input).is_err());
    }

    #[test]
    fn test_unlever_relever_roundtrip() {
        let beta_l = dec!(1.20);
        let tax = dec!(0.21);
        let de = dec!(0.50);

        let beta_u = unlever_beta(beta_l, tax, de).unwrap();
        let beta_l_back = relever_beta(beta_u, tax, de);

        assert!(
            (beta_l - beta_l_back).abs() < dec!(0.00001),
            "Round-trip failed: {beta_l} -> {beta_u} -> {beta_l_back}"
        );
    }

    #[test]
    fn test_debt_free_firm_relevered_beta_equals_unlevered() {
        let mut input = sample_input();
        input.debt_to_equity = Decimal::ZERO;
        input.debt_weight = Decimal::ZERO;
        input.equity_weight = Decimal::ONE;
        let out = calculate_wacc(&input).unwrap().result;
        assert_eq!(out.relevered_beta, dec!(0.80));
        assert_eq!(out.wacc, out.cost_of_equity);
    }

    #[test]
    fn test_methodology_string() {
        let result = calculate_wacc(&sample_input()).unwrap();
        assert_eq!(
            result.methodology,
            "WACC via CAPM with Hamada re-levered industry beta"
        );
    }
}
