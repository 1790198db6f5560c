use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::fields::LineItem;
use crate::error::IntrinsicError;
use crate::IntrinsicResult;

/// One reported fiscal period of a single statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    /// Fiscal period end date
    pub period_end: NaiveDate,
    /// Line items keyed by the provider's label
    pub items: BTreeMap<String, Decimal>,
}

impl StatementPeriod {
    pub fn new(period_end: NaiveDate) -> Self {
        Self {
            period_end,
            items: BTreeMap::new(),
        }
    }

    /// Builder-style insert, mainly for fixtures.
    pub fn with(mut self, label: &str, value: Decimal) -> Self {
        self.items.insert(label.to_string(), value);
        self
    }

    pub fn fiscal_year(&self) -> i32 {
        self.period_end.year()
    }

    /// Resolve a canonical line item through its alias table.
    pub fn get(&self, item: LineItem) -> Option<Decimal> {
        item.aliases()
            .iter()
            .find_map(|alias| self.items.get(*alias).copied())
    }

    /// Raw lookup by provider label.
    pub fn raw(&self, label: &str) -> Option<Decimal> {
        self.items.get(label).copied()
    }
}

/// A single statement (income, balance sheet or cash flow) as an ordered
/// list of fiscal periods.
///
/// Periods are strictly ascending by end date with one period per fiscal
/// year; every constructor enforces this, so "latest" is always the last
/// element rather than an assumed provider position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StatementPeriod>", into = "Vec<StatementPeriod>")]
pub struct StatementTable {
    periods: Vec<StatementPeriod>,
}

impl StatementTable {
    /// Build from periods that must already be in ascending order.
    pub fn new(periods: Vec<StatementPeriod>) -> IntrinsicResult<Self> {
        for pair in periods.windows(2) {
            if pair[0].period_end >= pair[1].period_end {
                return Err(IntrinsicError::InvalidInput {
                    field: "period_end".into(),
                    reason: format!(
                        "Statement periods must be strictly ascending: {} is not before {}",
                        pair[0].period_end, pair[1].period_end
                    ),
                });
            }
            if pair[0].fiscal_year() == pair[1].fiscal_year() {
                return Err(IntrinsicError::InvalidInput {
                    field: "period_end".into(),
                    reason: format!("Duplicate fiscal year {}", pair[0].fiscal_year()),
                });
            }
        }
        Ok(Self { periods })
    }

    /// Build from periods in any order (providers commonly return newest
    /// first). Duplicate years are still rejected.
    pub fn from_unsorted(mut periods: Vec<StatementPeriod>) -> IntrinsicResult<Self> {
        periods.sort_by_key(|p| p.period_end);
        Self::new(periods)
    }

    pub fn periods(&self) -> &[StatementPeriod] {
        &self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn fiscal_years(&self) -> Vec<i32> {
        self.periods.iter().map(StatementPeriod::fiscal_year).collect()
    }

    pub fn period(&self, fiscal_year: i32) -> Option<&StatementPeriod> {
        self.periods.iter().find(|p| p.fiscal_year() == fiscal_year)
    }

    /// True when any period resolves the item.
    pub fn has(&self, item: LineItem) -> bool {
        self.periods.iter().any(|p| p.get(item).is_some())
    }

    /// True when any period carries the raw label.
    pub fn has_label(&self, label: &str) -> bool {
        self.periods.iter().any(|p| p.items.contains_key(label))
    }

    pub fn value(&self, fiscal_year: i32, item: LineItem) -> Option<Decimal> {
        self.period(fiscal_year).and_then(|p| p.get(item))
    }

    /// Keep only the listed fiscal years, preserving order.
    pub fn restrict(&self, years: &[i32]) -> Self {
        Self {
            periods: self
                .periods
                .iter()
                .filter(|p| years.contains(&p.fiscal_year()))
                .cloned()
                .collect(),
        }
    }
}

impl TryFrom<Vec<StatementPeriod>> for StatementTable {
    type Error = IntrinsicError;

    fn try_from(periods: Vec<StatementPeriod>) -> Result<Self, Self::Error> {
        Self::from_unsorted(periods)
    }
}

impl From<StatementTable> for Vec<StatementPeriod> {
    fn from(table: StatementTable) -> Self {
        table.periods
    }
}
