//! Long-term growth rate from return on invested capital and reinvestment.
//!
//! NOPAT = EBIT * (1 - t)
//! Invested Capital = Net Fixed Assets + (Current Assets - Current Liabilities)
//! Reinvestment = CapEx + ΔWC - Depreciation
//! g = ROIC * Reinvestment / NOPAT
//!
//! The terminal rate is the mean implied g, capped at a ceiling: no firm
//! compounds above the economy's growth rate forever.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use super::capital::effective_tax_rate;
use crate::error::IntrinsicError;
use crate::statements::{
    FinancialStatementSet, LineItem, StatementSource, StatementTable, CURRENT_ASSET_FIELDS,
    CURRENT_LIABILITY_FIELDS,
};
use crate::stats;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Growth fundamentals for one aligned fiscal year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthYear {
    pub fiscal_year: i32,
    pub nopat: Money,
    pub working_capital: Money,
    pub invested_capital: Money,
    pub roic: Rate,
    /// None for the first year: there is no prior working capital to diff
    pub reinvestment: Option<Money>,
    /// None when there is no reinvestment or NOPAT is zero
    pub reinvestment_rate: Option<Rate>,
    pub implied_growth: Option<Rate>,
}

/// Per-year ROIC / reinvestment / g series for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthSeries {
    pub ticker: String,
    pub nopat_tax_rate: Rate,
    pub years: Vec<GrowthYear>,
}

impl GrowthSeries {
    pub fn roic(&self) -> Vec<Rate> {
        self.years.iter().map(|y| y.roic).collect()
    }

    pub fn reinvestment_rates(&self) -> Vec<Rate> {
        self.years.iter().filter_map(|y| y.reinvestment_rate).collect()
    }

    pub fn implied_growth(&self) -> Vec<Rate> {
        self.years.iter().filter_map(|y| y.implied_growth).collect()
    }
}

/// Averaged growth fundamentals and the capped terminal rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtgrSummary {
    pub average_roic: Rate,
    pub average_reinvestment_rate: Rate,
    /// Mean of the per-year implied g, before the cap
    pub implied_growth: Rate,
    /// min(implied_growth, ceiling)
    pub terminal_growth: Rate,
    pub ceiling: Rate,
    pub capped: bool,
    pub nopat_tax_rate: Rate,
    pub years: Vec<GrowthYear>,
}

/// Parameters for `estimate_ltgr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtgrParams {
    /// Upper bound on terminal growth
    pub ceiling: Rate,
    /// NOPAT tax rate used when no year has a defined effective rate
    pub fallback_tax_rate: Rate,
}

impl Default for LtgrParams {
    fn default() -> Self {
        Self {
            ceiling: dec!(0.06),
            fallback_tax_rate: dec!(0.30),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Sum of the canonical current-asset lines present in the balance sheet.
pub fn total_current_assets(balance: &StatementTable) -> IntrinsicResult<Vec<(i32, Money)>> {
    sum_present_fields(balance, CURRENT_ASSET_FIELDS, "Total Current Assets")
}

/// Sum of the canonical current-liability lines present in the balance sheet.
pub fn total_current_liabilities(balance: &StatementTable) -> IntrinsicResult<Vec<(i32, Money)>> {
    sum_present_fields(balance, CURRENT_LIABILITY_FIELDS, "Total Current Liabilities")
}

/// Average effective tax rate over every aligned year, or `fallback` when no
/// year has one. The second element is true when the fallback was used.
pub fn nopat_tax_rate(statements: &FinancialStatementSet, fallback: Rate) -> (Rate, bool) {
    match effective_tax_rate(statements, statements.years().len()) {
        Ok(rate) => (rate, false),
        Err(e) => {
            warn!(
                ticker = %statements.ticker,
                error = %e,
                fallback = %fallback,
                "no effective tax rate, using fallback for NOPAT"
            );
            (fallback, true)
        }
    }
}

/// ROIC, reinvestment rate and implied g for each aligned year.
///
/// Fails with `InvalidTerminalValue` when invested capital is not strictly
/// positive in any year.
pub fn compute_growth_series(
    statements: &FinancialStatementSet,
    tax_rate: Rate,
) -> IntrinsicResult<GrowthSeries> {
    let ticker = &statements.ticker;
    let years = statements.years();

    let ebit = statements.series(StatementSource::Income, LineItem::Ebit, years)?;
    let fixed_assets =
        statements.series(StatementSource::Balance, LineItem::NetFixedAssets, years)?;
    let capex = statements.series(StatementSource::CashFlow, LineItem::CapitalExpenditure, years)?;
    let depreciation = statements.series(StatementSource::CashFlow, LineItem::Depreciation, years)?;

    let balance = statements.table(StatementSource::Balance);
    let assets = total_current_assets(balance)?;
    let liabilities = total_current_liabilities(balance)?;

    let mut rows: Vec<GrowthYear> = Vec::with_capacity(years.len());
    let mut previous_wc: Option<Money> = None;

    for &year in years {
        let (Some(e), Some(nfa), Some(ca), Some(cl)) = (
            lookup(&ebit, year),
            lookup(&fixed_assets, year),
            lookup(&assets, year),
            lookup(&liabilities, year),
        ) else {
            warn!(ticker = %ticker, year, "year skipped in growth series: incomplete lines");
            previous_wc = None;
            continue;
        };

        let nopat = e * (Decimal::ONE - tax_rate);
        let working_capital = ca - cl;
        let invested_capital = nfa + working_capital;
        if invested_capital <= Decimal::ZERO {
            return Err(IntrinsicError::InvalidTerminalValue(format!(
                "{ticker}: invested capital {invested_capital} in {year} is not positive"
            )));
        }
        let roic = nopat / invested_capital;

        let reinvestment = match (previous_wc, lookup(&capex, year), lookup(&depreciation, year)) {
            (Some(prev), Some(cx), Some(dep)) => Some(cx.abs() + (working_capital - prev) - dep),
            _ => None,
        };
        let reinvestment_rate = match reinvestment {
            Some(r) if !nopat.is_zero() => Some(r / nopat),
            _ => None,
        };
        let implied_growth = reinvestment_rate.map(|rate| roic * rate);

        rows.push(GrowthYear {
            fiscal_year: year,
            nopat,
            working_capital,
            invested_capital,
            roic,
            reinvestment,
            reinvestment_rate,
            implied_growth,
        });
        previous_wc = Some(working_capital);
    }

    if rows.is_empty() {
        return Err(IntrinsicError::InsufficientData(format!(
            "{ticker}: no fiscal year has EBIT, fixed assets and working capital"
        )));
    }

    Ok(GrowthSeries {
        ticker: ticker.clone(),
        nopat_tax_rate: tax_rate,
        years: rows,
    })
}

/// Average the series and cap the mean implied growth at `ceiling`.
pub fn terminal_growth(series: &GrowthSeries, ceiling: Rate) -> IntrinsicResult<LtgrSummary> {
    let growth = series.implied_growth();
    let implied_growth = stats::mean(&growth).ok_or_else(|| {
        IntrinsicError::InsufficientData(format!(
            "{}: no year yields an implied growth rate (need two consecutive years with positive NOPAT)",
            series.ticker
        ))
    })?;
    let average_roic = stats::mean(&series.roic()).unwrap_or(Decimal::ZERO);
    let average_reinvestment_rate =
        stats::mean(&series.reinvestment_rates()).unwrap_or(Decimal::ZERO);

    let capped = implied_growth > ceiling;
    let terminal = implied_growth.min(ceiling);

    Ok(LtgrSummary {
        average_roic,
        average_reinvestment_rate,
        implied_growth,
        terminal_growth: terminal,
        ceiling,
        capped,
        nopat_tax_rate: series.nopat_tax_rate,
        years: series.years.clone(),
    })
}

/// Tax rate, growth series and capped terminal growth in one call.
pub fn estimate_ltgr(
    statements: &FinancialStatementSet,
    params: &LtgrParams,
) -> IntrinsicResult<ComputationOutput<LtgrSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if params.fallback_tax_rate < Decimal::ZERO || params.fallback_tax_rate >= Decimal::ONE {
        return Err(IntrinsicError::InvalidInput {
            field: "fallback_tax_rate".into(),
            reason: "Fallback tax rate must be in [0, 1)".into(),
        });
    }

    let (tax_rate, fallback) = nopat_tax_rate(statements, params.fallback_tax_rate);
    if fallback {
        warnings.push(format!(
            "No defined effective tax rate; NOPAT uses the fallback rate {tax_rate}"
        ));
    }

    let series = compute_growth_series(statements, tax_rate)?;
    let summary = terminal_growth(&series, params.ceiling)?;

    if summary.capped {
        warnings.push(format!(
            "Implied growth {} exceeds the ceiling; terminal growth capped at {}",
            summary.implied_growth, summary.ceiling
        ));
    }
    if summary.terminal_growth < Decimal::ZERO {
        warnings.push(format!(
            "Negative terminal growth ({}): the firm is disinvesting",
            summary.terminal_growth
        ));
    }

    debug!(
        ticker = %statements.ticker,
        implied = %summary.implied_growth,
        terminal = %summary.terminal_growth,
        "ltgr estimated"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Long-term growth: mean ROIC x reinvestment rate, capped",
        params,
        warnings,
        elapsed,
        summary,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn sum_present_fields(
    balance: &StatementTable,
    fields: &[&str],
    aggregate: &str,
) -> IntrinsicResult<Vec<(i32, Money)>> {
    let present: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| balance.has_label(f))
        .collect();
    if present.is_empty() {
        return Err(IntrinsicError::missing(
            aggregate,
            "no component line item in balance sheet",
        ));
    }
    // A period reporting none of the components has no aggregate for that year.
    Ok(balance
        .periods()
        .iter()
        .filter_map(|p| {
            let values: Vec<Money> = present.iter().filter_map(|f| p.raw(f)).collect();
            if values.is_empty() {
                return None;
            }
            Some((p.fiscal_year(), values.into_iter().sum()))
        })
        .collect())
}

fn lookup(series: &[(i32, Decimal)], year: i32) -> Option<Decimal> {
    series.iter().find(|(y, _)| *y == year).map(|(_, v)| *v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
