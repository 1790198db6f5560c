use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::prices::{PricePoint, PriceSeries};
use super::provider::{CompanyProfile, MarketDataProvider};
use crate::error::IntrinsicError;
use crate::statements::StatementTable;
use crate::IntrinsicResult;

/// Everything the valuation needs to know about one symbol.
///
/// Index symbols only carry `prices`; companies carry all fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<CompanyProfile>,
    #[serde(default)]
    pub prices: Vec<PricePoint>,
    #[serde(default)]
    pub income: StatementTable,
    #[serde(default)]
    pub balance: StatementTable,
    #[serde(default)]
    pub cashflow: StatementTable,
}

/// In-memory provider seeded from snapshot data.
///
/// Backs the test-suite and the CLI's `--data` file, so the valuation runs
/// without network access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureProvider {
    symbols: BTreeMap<String, SymbolSnapshot>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> IntrinsicResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, symbol: &str, snapshot: SymbolSnapshot) {
        self.symbols.insert(symbol.to_string(), snapshot);
    }

    pub fn with_symbol(mut self, symbol: &str, snapshot: SymbolSnapshot) -> Self {
        self.insert(symbol, snapshot);
        self
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    fn snapshot(&self, symbol: &str) -> IntrinsicResult<&SymbolSnapshot> {
        self.symbols.get(symbol).ok_or_else(|| {
            IntrinsicError::InsufficientData(format!("No market data loaded for {symbol}"))
        })
    }

    fn statement(
        &self,
        symbol: &str,
        pick: fn(&SymbolSnapshot) -> &StatementTable,
        name: &str,
    ) -> IntrinsicResult<StatementTable> {
        let table = pick(self.snapshot(symbol)?);
        if table.is_empty() {
            return Err(IntrinsicError::missing(name, symbol));
        }
        Ok(table.clone())
    }
}

impl MarketDataProvider for FixtureProvider {
    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> IntrinsicResult<PriceSeries> {
        let snapshot = self.snapshot(symbol)?;
        Ok(PriceSeries::new(symbol, snapshot.prices.clone())?.between(start, end))
    }

    fn income_statement(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.statement(symbol, |s| &s.income, "income statement")
    }

    fn balance_sheet(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.statement(symbol, |s| &s.balance, "balance sheet")
    }

    fn cash_flow(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.statement(symbol, |s| &s.cashflow, "cash flow statement")
    }

    fn profile(&self, symbol: &str) -> IntrinsicResult<CompanyProfile> {
        self.snapshot(symbol)?
            .profile
            .clone()
            .ok_or_else(|| IntrinsicError::missing("profile", symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SNAPSHOT: &str = r#"{
        "symbols": {
            "^IDX": {
                "prices": [
                    {"date": "2024-01-31", "close": "100"},
                    {"date": "2024-02-29", "close": "102"},
                    {"date": "2024-03-28", "close": "101"}
                ]
            },
            "ABC": {
                "profile": {
                    "symbol": "ABC",
                    "name": "ABC Industries",
                    "shares_outstanding": "1000",
                    "current_price": "12.5"
                },
                "income": [{"period_end": "2024-03-31", "items": {"EBIT": "10"}}]
            }
        }
    }"#;

    #[test]
    fn test_loads_snapshot_json() {
        let provider = FixtureProvider::from_json_str(SNAPSHOT).unwrap();
        let profile = provider.profile("ABC").unwrap();
        assert_eq!(profile.name, "ABC Industries");
        assert_eq!(profile.current_price, dec!(12.5));

        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let prices = provider.price_history("^IDX", start, end).unwrap();
        assert_eq!(prices.len(), 2);
    }

    #[test]
    fn test_unknown_symbol_and_missing_statement() {
        let provider = FixtureProvider::from_json_str(SNAPSHOT).unwrap();
        assert!(matches!(
            provider.profile("XYZ"),
            Err(IntrinsicError::InsufficientData(_))
        ));
        assert!(matches!(
            provider.balance_sheet("ABC"),
            Err(IntrinsicError::MissingField { .. })
        ));
        assert!(matches!(
            provider.profile("^IDX"),
            Err(IntrinsicError::MissingField { .. })
        ));
    }
}
