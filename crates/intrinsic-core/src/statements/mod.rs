//! Annual financial statements for one company, aligned on fiscal year.
//!
//! Income statement, balance sheet and cash-flow statement arrive from the
//! provider as independent tables. `FinancialStatementSet` keeps only the
//! fiscal years present in all three so every ratio is computed on the same
//! periods.

pub mod fields;
pub mod table;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IntrinsicError;
use crate::IntrinsicResult;

pub use fields::{LineItem, CURRENT_ASSET_FIELDS, CURRENT_LIABILITY_FIELDS};
pub use table::{StatementPeriod, StatementTable};

/// Which statement a line item is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementSource {
    Income,
    Balance,
    CashFlow,
}

impl fmt::Display for StatementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementSource::Income => "income statement",
            StatementSource::Balance => "balance sheet",
            StatementSource::CashFlow => "cash flow statement",
        };
        f.write_str(name)
    }
}

/// Aligned income / balance / cash-flow statements for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialStatementSet {
    pub ticker: String,
    years: Vec<i32>,
    income: StatementTable,
    balance: StatementTable,
    cashflow: StatementTable,
}

impl FinancialStatementSet {
    /// Intersect fiscal years across the three statements.
    pub fn align(
        ticker: &str,
        income: StatementTable,
        balance: StatementTable,
        cashflow: StatementTable,
    ) -> IntrinsicResult<Self> {
        let balance_years = balance.fiscal_years();
        let cashflow_years = cashflow.fiscal_years();
        let years: Vec<i32> = income
            .fiscal_years()
            .into_iter()
            .filter(|y| balance_years.contains(y) && cashflow_years.contains(y))
            .collect();

        if years.is_empty() {
            return Err(IntrinsicError::InsufficientData(format!(
                "{ticker}: no fiscal year is reported in all three statements"
            )));
        }

        Ok(Self {
            ticker: ticker.to_string(),
            income: income.restrict(&years),
            balance: balance.restrict(&years),
            cashflow: cashflow.restrict(&years),
            years,
        })
    }

    /// Aligned fiscal years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// The most recent `n` aligned years (all of them if fewer exist).
    pub fn latest_years(&self, n: usize) -> &[i32] {
        let start = self.years.len().saturating_sub(n);
        &self.years[start..]
    }

    pub fn table(&self, source: StatementSource) -> &StatementTable {
        match source {
            StatementSource::Income => &self.income,
            StatementSource::Balance => &self.balance,
            StatementSource::CashFlow => &self.cashflow,
        }
    }

    pub fn value(&self, source: StatementSource, year: i32, item: LineItem) -> Option<Decimal> {
        self.table(source).value(year, item)
    }

    /// Values of `item` for the requested years, skipping years that do not
    /// report it. Fails when the line item is absent from every one of them.
    pub fn series(
        &self,
        source: StatementSource,
        item: LineItem,
        years: &[i32],
    ) -> IntrinsicResult<Vec<(i32, Decimal)>> {
        let table = self.table(source);
        let values: Vec<(i32, Decimal)> = years
            .iter()
            .filter_map(|&y| table.value(y, item).map(|v| (y, v)))
            .collect();
        if values.is_empty() {
            return Err(IntrinsicError::missing(
                item.label(),
                format!("{} {source}", self.ticker),
            ));
        }
        Ok(values)
    }

    /// `series` over every aligned year.
    pub fn full_series(
        &self,
        source: StatementSource,
        item: LineItem,
    ) -> IntrinsicResult<Vec<(i32, Decimal)>> {
        self.series(source, item, &self.years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn table(years: &[i32], label: &str) -> StatementTable {
        let periods = years
            .iter()
            .map(|&y| {
                StatementPeriod::new(NaiveDate::from_ymd_opt(y, 3, 31).unwrap())
                    .with(label, Decimal::from(y))
            })
            .collect();
        StatementTable::new(periods).unwrap()
    }

    #[test]
    fn test_align_intersects_years() {
        let set = FinancialStatementSet::align(
            "ABC",
            table(&[2020, 2021, 2022, 2023], "EBIT"),
            table(&[2021, 2022, 2023, 2024], "Total Debt"),
            table(&[2021, 2023], "Depreciation"),
        )
        .unwrap();
        assert_eq!(set.years(), &[2021, 2023]);
        assert_eq!(set.table(StatementSource::Income).fiscal_years(), vec![2021, 2023]);
    }

    #[test]
    fn test_align_with_no_common_year_fails() {
        let err = FinancialStatementSet::align(
            "ABC",
            table(&[2020], "EBIT"),
            table(&[2021], "Total Debt"),
            table(&[2021], "Depreciation"),
        )
        .unwrap_err();
        assert!(matches!(err, IntrinsicError::InsufficientData(_)));
    }

    #[test]
    fn test_latest_years() {
        let set = FinancialStatementSet::align(
            "ABC",
            table(&[2020, 2021, 2022, 2023], "EBIT"),
            table(&[2020, 2021, 2022, 2023], "Total Debt"),
            table(&[2020, 2021, 2022, 2023], "Depreciation"),
        )
        .unwrap();
        assert_eq!(set.latest_years(3), &[2021, 2022, 2023]);
        assert_eq!(set.latest_years(10), &[2020, 2021, 2022, 2023]);
    }

    #[test]
    fn test_series_missing_field_is_typed_error() {
        let set = FinancialStatementSet::align(
            "ABC",
            table(&[2023], "EBIT"),
            table(&[2023], "Total Debt"),
            table(&[2023], "Depreciation"),
        )
        .unwrap();
        let ebit = set
            .full_series(StatementSource::Income, LineItem::Ebit)
            .unwrap();
        assert_eq!(ebit, vec![(2023, dec!(2023))]);

        let err = set
            .full_series(StatementSource::Balance, LineItem::MinorityInterest)
            .unwrap_err();
        match err {
            IntrinsicError::MissingField { field, context } => {
                assert_eq!(field, "Minority Interest");
                assert!(context.contains("balance sheet"));
            }
            e => panic!("Expected MissingField, got {e:?}"),
        }
    }
}
