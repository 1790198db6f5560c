use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::IntrinsicError;
use crate::market_data::PriceSeries;
use crate::statements::{FinancialStatementSet, LineItem, StatementSource};
use crate::stats;
use crate::types::{Money, Rate};
use crate::IntrinsicResult;

/// Averaged capital structure over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalStructureSnapshot {
    /// Mean of price × shares outstanding over the price window
    pub average_market_cap: Money,
    /// Mean reported total debt over the trailing statement years
    pub average_total_debt: Money,
    /// average_total_debt / average_market_cap
    pub debt_to_equity: Decimal,
    /// Statement years averaged
    pub statement_years: Vec<i32>,
}

impl CapitalStructureSnapshot {
    /// E / (E + D)
    pub fn equity_weight(&self) -> Rate {
        self.average_market_cap / (self.average_market_cap + self.average_total_debt)
    }

    /// D / (E + D)
    pub fn debt_weight(&self) -> Rate {
        self.average_total_debt / (self.average_market_cap + self.average_total_debt)
    }
}

/// Build the capital-structure snapshot from the price history, the current
/// share count and the most recent `years` of balance sheets.
pub fn capital_structure(
    prices: &PriceSeries,
    shares_outstanding: Decimal,
    statements: &FinancialStatementSet,
    years: usize,
) -> IntrinsicResult<CapitalStructureSnapshot> {
    if shares_outstanding <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "shares_outstanding".into(),
            reason: format!("{}: shares outstanding must be positive", statements.ticker),
        });
    }
    let mean_price = prices.mean_close().ok_or_else(|| {
        IntrinsicError::InsufficientData(format!(
            "{}: no prices in window for market capitalisation",
            prices.symbol
        ))
    })?;
    let average_market_cap = mean_price * shares_outstanding;
    if average_market_cap <= Decimal::ZERO {
        return Err(IntrinsicError::DivisionByZero {
            context: format!("{}: debt/equity with non-positive market cap", prices.symbol),
        });
    }

    let window = statements.latest_years(years);
    let debt = statements.series(StatementSource::Balance, LineItem::TotalDebt, window)?;
    let debt_values: Vec<Money> = debt.iter().map(|(_, v)| *v).collect();
    let average_total_debt = stats::mean(&debt_values).unwrap_or(Decimal::ZERO);

    Ok(CapitalStructureSnapshot {
        average_market_cap,
        average_total_debt,
        debt_to_equity: average_total_debt / average_market_cap,
        statement_years: debt.iter().map(|(y, _)| *y).collect(),
    })
}

/// Mean of tax provision / pretax income over the most recent `years`,
/// skipping years where the ratio is undefined (zero pretax income).
pub fn effective_tax_rate(
    statements: &FinancialStatementSet,
    years: usize,
) -> IntrinsicResult<Rate> {
    let window = statements.latest_years(years);
    let tax = statements.series(StatementSource::Income, LineItem::TaxProvision, window)?;
    let pretax = statements.series(StatementSource::Income, LineItem::PretaxIncome, window)?;

    let ratios: Vec<Rate> = tax
        .iter()
        .filter_map(|(year, t)| {
            pretax
                .iter()
                .find(|(y, _)| y == year)
                .and_then(|(_, p)| if p.is_zero() { None } else { Some(t / p) })
        })
        .collect();

    stats::mean(&ratios).ok_or_else(|| {
        IntrinsicError::InsufficientData(format!(
            "{}: no year with a defined effective tax rate",
            statements.ticker
        ))
    })
}

/// Mean absolute interest expense over mean total debt, pre-tax.
///
/// Returns zero for a firm with no debt over the window; the interest line is
/// then not required.
pub fn pre_tax_cost_of_debt(
    statements: &FinancialStatementSet,
    years: usize,
) -> IntrinsicResult<Rate> {
    let window = statements.latest_years(years);
    let debt = statements.series(StatementSource::Balance, LineItem::TotalDebt, window)?;
    let debt_values: Vec<Money> = debt.iter().map(|(_, v)| *v).collect();
    let average_debt = stats::mean(&debt_values).unwrap_or(Decimal::ZERO);
    if average_debt.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let interest = statements.series(StatementSource::Income, LineItem::InterestExpense, window)?;
    let interest_values: Vec<Money> = interest.iter().map(|(_, v)| v.abs()).collect();
    let average_interest = stats::mean(&interest_values).unwrap_or(Decimal::ZERO);

    Ok(average_interest / average_debt)
}
