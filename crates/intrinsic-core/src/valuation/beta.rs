//! Regression beta, Hamada unlevering and the peer-median industry beta.
//!
//! Levered beta is the slope of an OLS regression (with intercept) of the
//! asset's log returns on the market index's log returns, after both series
//! are resampled to a common frequency and inner-joined on period. The
//! industry beta is the median unlevered beta over a peer set, which keeps a
//! single distressed peer from dominating.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::capital::{capital_structure, effective_tax_rate};
use super::wacc::unlever_beta;
use super::CompanyData;
use crate::error::{ErrorKind, IntrinsicError};
use crate::market_data::{align_returns, Frequency, MarketDataProvider, PriceSeries};
use crate::stats::{self, RegressionFit};
use crate::types::Rate;
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Unlevered beta for one company with the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnleveredBeta {
    pub ticker: String,
    /// Regression slope against the market index
    pub levered_beta: Decimal,
    /// Mean effective tax rate over the statement window
    pub tax_rate: Rate,
    /// Mean total debt / mean market capitalisation
    pub debt_to_equity: Decimal,
    /// levered / (1 + (1 - t) * D/E)
    pub unlevered_beta: Decimal,
    /// Aligned return periods used in the regression
    pub observations: usize,
}

/// A peer excluded from the median, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPeer {
    pub ticker: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Peer-set beta, computed once and passed by value to every valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerBetaSummary {
    pub median_unlevered_beta: Decimal,
    pub peers: Vec<UnleveredBeta>,
    pub skipped: Vec<SkippedPeer>,
}

/// Date range and sampling used for every regression in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub frequency: Frequency,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Full regression of asset log returns on market log returns.
pub fn regress_returns(
    asset_prices: &PriceSeries,
    market_prices: &PriceSeries,
    frequency: Frequency,
) -> IntrinsicResult<RegressionFit> {
    let asset_returns = asset_prices.log_returns(frequency)?;
    let market_returns = market_prices.log_returns(frequency)?;
    let (market, asset) = align_returns(&market_returns, &asset_returns);

    if market.len() < 2 {
        return Err(IntrinsicError::InsufficientData(format!(
            "{} vs {}: {} overlapping return periods, need at least 2",
            asset_prices.symbol,
            market_prices.symbol,
            market.len()
        )));
    }

    stats::ols(&market, &asset)
}

/// Levered beta: the market coefficient of `regress_returns`.
pub fn compute_levered_beta(
    asset_prices: &PriceSeries,
    market_prices: &PriceSeries,
    frequency: Frequency,
) -> IntrinsicResult<Decimal> {
    Ok(regress_returns(asset_prices, market_prices, frequency)?.beta)
}

/// Unlever a company's regression beta with its own average leverage and
/// effective tax rate over the most recent `statement_years`.
pub fn unlevered_beta(
    company: &CompanyData,
    market_prices: &PriceSeries,
    frequency: Frequency,
    statement_years: usize,
) -> IntrinsicResult<UnleveredBeta> {
    let ticker = company.ticker().to_string();
    let tax_rate = effective_tax_rate(&company.statements, statement_years)?;
    let structure = capital_structure(
        &company.prices,
        company.profile.shares_outstanding,
        &company.statements,
        statement_years,
    )?;
    let fit = regress_returns(&company.prices, market_prices, frequency)?;
    let unlevered = unlever_beta(fit.beta, tax_rate, structure.debt_to_equity)?;

    debug!(
        ticker = %ticker,
        levered = %fit.beta,
        unlevered = %unlevered,
        "unlevered beta"
    );

    Ok(UnleveredBeta {
        ticker,
        levered_beta: fit.beta,
        tax_rate,
        debt_to_equity: structure.debt_to_equity,
        unlevered_beta: unlevered,
        observations: fit.observations,
    })
}

/// Median unlevered beta across `peers`.
///
/// A peer whose data is missing or degenerate is skipped with a warning;
/// the call only fails when no peer produces a beta.
pub fn median_unlevered_beta<P: MarketDataProvider>(
    provider: &P,
    peers: &[String],
    market_prices: &PriceSeries,
    window: &EstimationWindow,
    statement_years: usize,
) -> IntrinsicResult<PeerBetaSummary> {
    let mut estimates = Vec::with_capacity(peers.len());
    let mut skipped = Vec::new();

    for ticker in peers {
        let estimate = CompanyData::fetch(provider, ticker, window.start, window.end)
            .and_then(|company| {
                unlevered_beta(&company, market_prices, window.frequency, statement_years)
            });
        match estimate {
            Ok(beta) => estimates.push(beta),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "peer excluded from median beta");
                skipped.push(SkippedPeer {
                    ticker: ticker.clone(),
                    kind: e.kind(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let betas: Vec<Decimal> = estimates.iter().map(|b| b.unlevered_beta).collect();
    let median = stats::median(&betas).ok_or_else(|| {
        IntrinsicError::InsufficientData(format!(
            "No unlevered beta could be computed for any of {} peers",
            peers.len()
        ))
    })?;

    Ok(PeerBetaSummary {
        median_unlevered_beta: median,
        peers: estimates,
        skipped,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
