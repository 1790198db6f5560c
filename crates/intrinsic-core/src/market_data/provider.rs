use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::prices::PriceSeries;
use crate::statements::{FinancialStatementSet, StatementTable};
use crate::types::Money;
use crate::IntrinsicResult;

/// Static facts about a listed company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    /// Display name
    pub name: String,
    pub shares_outstanding: Decimal,
    pub current_price: Money,
}

/// The single seam through which the valuation reads external data.
///
/// Implementations signal transport problems with
/// `IntrinsicError::DataProvider` and absent line items with
/// `IntrinsicError::MissingField`, so callers can retry only the former.
pub trait MarketDataProvider {
    /// Daily adjusted closes with `start <= date < end`.
    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> IntrinsicResult<PriceSeries>;

    /// Annual income statement.
    fn income_statement(&self, symbol: &str) -> IntrinsicResult<StatementTable>;

    /// Annual balance sheet.
    fn balance_sheet(&self, symbol: &str) -> IntrinsicResult<StatementTable>;

    /// Annual cash-flow statement.
    fn cash_flow(&self, symbol: &str) -> IntrinsicResult<StatementTable>;

    fn profile(&self, symbol: &str) -> IntrinsicResult<CompanyProfile>;

    /// All three statements aligned on common fiscal years.
    fn statements(&self, symbol: &str) -> IntrinsicResult<FinancialStatementSet> {
        FinancialStatementSet::align(
            symbol,
            self.income_statement(symbol)?,
            self.balance_sheet(symbol)?,
            self.cash_flow(symbol)?,
        )
    }
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for &P {
    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> IntrinsicResult<PriceSeries> {
        (**self).price_history(symbol, start, end)
    }

    fn income_statement(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        (**self).income_statement(symbol)
    }

    fn balance_sheet(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        (**self).balance_sheet(symbol)
    }

    fn cash_flow(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        (**self).cash_flow(symbol)
    }

    fn profile(&self, symbol: &str) -> IntrinsicResult<CompanyProfile> {
        (**self).profile(symbol)
    }
}
