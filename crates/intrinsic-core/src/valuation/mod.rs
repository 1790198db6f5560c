pub mod beta;
pub mod capital;
pub mod dcf;
pub mod growth;
pub mod wacc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::market_data::{CompanyProfile, MarketDataProvider, PriceSeries};
use crate::statements::FinancialStatementSet;
use crate::IntrinsicResult;

/// Provider data for one company over the estimation window, fetched once
/// and shared read-only by every estimator.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyData {
    pub profile: CompanyProfile,
    pub prices: PriceSeries,
    pub statements: FinancialStatementSet,
}

impl CompanyData {
    pub fn fetch<P: MarketDataProvider>(
        provider: &P,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> IntrinsicResult<Self> {
        debug!(ticker, %start, %end, "fetching company data");
        let profile = provider.profile(ticker)?;
        let prices = provider.price_history(ticker, start, end)?;
        let statements = provider.statements(ticker)?;
        Ok(Self {
            profile,
            prices,
            statements,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.profile.symbol
    }
}
