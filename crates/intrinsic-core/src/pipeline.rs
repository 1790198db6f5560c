//! Batch valuation over a ticker list.
//!
//! The peer median beta is computed once and passed by value into every
//! per-ticker valuation. A ticker that fails is recorded with its error kind
//! and the batch moves on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ValuationConfig;
use crate::error::ErrorKind;
use crate::market_data::{MarketDataProvider, PriceSeries};
use crate::types::{Money, Rate};
use crate::valuation::beta::{median_unlevered_beta, EstimationWindow, PeerBetaSummary};
use crate::valuation::dcf::{value_company, Assumptions, ForecastRow, Recommendation};
use crate::valuation::growth::{estimate_ltgr, LtgrSummary};
use crate::valuation::wacc::{estimate_wacc, WaccBreakdown};
use crate::valuation::CompanyData;
use crate::IntrinsicResult;

/// Full valuation report for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationReport {
    pub ticker: String,
    pub company_name: String,
    pub wacc: WaccBreakdown,
    pub ltgr: LtgrSummary,
    pub assumptions: Assumptions,
    pub forecast: Vec<ForecastRow>,
    pub terminal_value: Money,
    pub firm_value: Money,
    pub equity_value: Money,
    pub intrinsic_value_per_share: Money,
    pub market_price_per_share: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upside: Option<Rate>,
    pub recommendation: Recommendation,
    pub warnings: Vec<String>,
}

/// Result-or-error for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerOutcome {
    Valued(Box<ValuationReport>),
    Failed {
        ticker: String,
        kind: ErrorKind,
        message: String,
    },
}

impl TickerOutcome {
    pub fn ticker(&self) -> &str {
        match self {
            TickerOutcome::Valued(report) => &report.ticker,
            TickerOutcome::Failed { ticker, .. } => ticker,
        }
    }

    pub fn report(&self) -> Option<&ValuationReport> {
        match self {
            TickerOutcome::Valued(report) => Some(report.as_ref()),
            TickerOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub market_index: String,
    pub window: EstimationWindow,
    pub peer_beta: PeerBetaSummary,
    pub outcomes: Vec<TickerOutcome>,
}

impl BatchReport {
    pub fn valued(&self) -> impl Iterator<Item = &ValuationReport> {
        self.outcomes.iter().filter_map(TickerOutcome::report)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.valued().count()
    }
}

/// Wires a provider and a configuration into the valuation steps.
pub struct Pipeline<P> {
    provider: P,
    config: ValuationConfig,
}

impl<P: MarketDataProvider> Pipeline<P> {
    pub fn new(provider: P, config: ValuationConfig) -> IntrinsicResult<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn window(&self) -> IntrinsicResult<EstimationWindow> {
        self.config.estimation_window()
    }

    pub fn market_prices(&self, window: &EstimationWindow) -> IntrinsicResult<PriceSeries> {
        self.provider
            .price_history(&self.config.market_index, window.start, window.end)
    }

    /// Median unlevered beta over the configured peers.
    pub fn peer_beta(
        &self,
        market: &PriceSeries,
        window: &EstimationWindow,
    ) -> IntrinsicResult<PeerBetaSummary> {
        median_unlevered_beta(
            &self.provider,
            &self.config.peers,
            market,
            window,
            self.config.lookback_years as usize,
        )
    }

    /// WACC for one ticker given the industry beta.
    pub fn wacc(
        &self,
        ticker: &str,
        industry_beta: Decimal,
        market: &PriceSeries,
        window: &EstimationWindow,
    ) -> IntrinsicResult<WaccBreakdown> {
        let company = CompanyData::fetch(&self.provider, ticker, window.start, window.end)?;
        self.wacc_for(&company, industry_beta, market, window)
    }

    /// LTGR for one ticker.
    pub fn ltgr(&self, ticker: &str) -> IntrinsicResult<LtgrSummary> {
        let statements = self.provider.statements(ticker)?;
        Ok(estimate_ltgr(&statements, &self.config.ltgr_params())?.result)
    }

    /// Value one ticker end to end.
    pub fn value_ticker(
        &self,
        ticker: &str,
        industry_beta: Decimal,
        market: &PriceSeries,
        window: &EstimationWindow,
    ) -> IntrinsicResult<ValuationReport> {
        let company = CompanyData::fetch(&self.provider, ticker, window.start, window.end)?;

        let wacc = self.wacc_for(&company, industry_beta, market, window)?;
        let ltgr = estimate_ltgr(&company.statements, &self.config.ltgr_params())?;
        let valued = value_company(
            &company,
            wacc.wacc,
            ltgr.result.terminal_growth,
            &self.config.dcf_params(),
        )?;

        let mut warnings: Vec<String> = Vec::new();
        warnings.extend(wacc.warnings.iter().map(|w| format!("[WACC] {w}")));
        warnings.extend(ltgr.warnings.iter().map(|w| format!("[LTGR] {w}")));
        warnings.extend(valued.warnings.iter().map(|w| format!("[DCF] {w}")));

        let result = valued.result;
        Ok(ValuationReport {
            ticker: ticker.to_string(),
            company_name: company.profile.name.clone(),
            wacc,
            ltgr: ltgr.result,
            assumptions: result.assumptions,
            forecast: result.dcf.forecast,
            terminal_value: result.dcf.terminal_value,
            firm_value: result.dcf.firm_value,
            equity_value: result.dcf.equity_value,
            intrinsic_value_per_share: result.valuation.intrinsic_value_per_share,
            market_price_per_share: result.valuation.market_price_per_share,
            upside: result.valuation.upside,
            recommendation: result.valuation.recommendation,
            warnings,
        })
    }

    /// Peer beta once, then every target ticker.
    ///
    /// Fails only when the index or the peer beta cannot be computed; a
    /// ticker-level failure becomes a `TickerOutcome::Failed`.
    pub fn run(&self) -> IntrinsicResult<BatchReport> {
        let window = self.window()?;
        let market = self.market_prices(&window)?;
        let peer_beta = self.peer_beta(&market, &window)?;
        info!(
            peers = peer_beta.peers.len(),
            skipped = peer_beta.skipped.len(),
            median = %peer_beta.median_unlevered_beta,
            "peer beta computed"
        );

        let outcomes = self
            .config
            .targets()
            .iter()
            .map(|ticker| {
                match self.value_ticker(ticker, peer_beta.median_unlevered_beta, &market, &window) {
                    Ok(report) => {
                        debug!(ticker = %ticker, recommendation = %report.recommendation, "valued");
                        TickerOutcome::Valued(Box::new(report))
                    }
                    Err(e) => {
                        warn!(ticker = %ticker, error = %e, "valuation failed");
                        TickerOutcome::Failed {
                            ticker: ticker.clone(),
                            kind: e.kind(),
                            message: e.to_string(),
                        }
                    }
                }
            })
            .collect();

        Ok(BatchReport {
            market_index: self.config.market_index.clone(),
            window,
            peer_beta,
            outcomes,
        })
    }

    fn wacc_for(
        &self,
        company: &CompanyData,
        industry_beta: Decimal,
        market: &PriceSeries,
        window: &EstimationWindow,
    ) -> IntrinsicResult<WaccBreakdown> {
        estimate_wacc(
            company,
            market,
            industry_beta,
            window,
            self.config.risk_free_rate,
            self.config.capital_structure_years,
        )
    }
}
