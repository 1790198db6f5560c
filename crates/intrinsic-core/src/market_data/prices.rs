use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::IntrinsicError;
use crate::stats;
use crate::IntrinsicResult;

/// Sampling frequency for return calculations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every observation as supplied
    Daily,
    /// Last observation of each calendar month, labelled with the month-end date
    #[default]
    MonthEnd,
}

impl Frequency {
    /// Periods per year, used to annualise mean returns.
    pub fn periods_per_year(self) -> Decimal {
        match self {
            Frequency::Daily => Decimal::from(252),
            Frequency::MonthEnd => Decimal::from(12),
        }
    }
}

/// A single (date, adjusted close) observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// Ordered price history for one security or index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series; points are sorted by date and duplicate dates rejected.
    pub fn new(symbol: &str, mut points: Vec<PricePoint>) -> IntrinsicResult<Self> {
        points.sort_by_key(|p| p.date);
        if let Some(pair) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(IntrinsicError::InvalidInput {
                field: "date".into(),
                reason: format!("{symbol}: duplicate price observation on {}", pair[0].date),
            });
        }
        Ok(Self {
            symbol: symbol.to_string(),
            points,
        })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observations with `start <= date < end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date < end)
                .copied()
                .collect(),
        }
    }

    /// Mean closing price over the whole series.
    pub fn mean_close(&self) -> Option<Decimal> {
        let closes: Vec<Decimal> = self.points.iter().map(|p| p.close).collect();
        stats::mean(&closes)
    }

    pub fn resample(&self, frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => self.clone(),
            Frequency::MonthEnd => {
                let mut resampled: Vec<PricePoint> = Vec::new();
                for point in &self.points {
                    let label = month_end(point.date);
                    match resampled.last_mut() {
                        Some(last) if last.date == label => last.close = point.close,
                        _ => resampled.push(PricePoint {
                            date: label,
                            close: point.close,
                        }),
                    }
                }
                Self {
                    symbol: self.symbol.clone(),
                    points: resampled,
                }
            }
        }
    }

    /// Log returns at `frequency`, labelled with the end date of each period.
    ///
    /// Under month-end sampling a return is only formed between adjacent
    /// calendar months; a month with no observations breaks the chain
    /// instead of producing a two-month return.
    pub fn log_returns(&self, frequency: Frequency) -> IntrinsicResult<Vec<(NaiveDate, Decimal)>> {
        let sampled = self.resample(frequency);
        let mut returns = Vec::with_capacity(sampled.len().saturating_sub(1));
        for pair in sampled.points.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if frequency == Frequency::MonthEnd && !adjacent_months(prev.date, curr.date) {
                continue;
            }
            returns.push((curr.date, stats::log_return(prev.close, curr.close)?));
        }
        Ok(returns)
    }
}

/// Inner join of two labelled return series on their dates.
pub fn align_returns(
    left: &[(NaiveDate, Decimal)],
    right: &[(NaiveDate, Decimal)],
) -> (Vec<Decimal>, Vec<Decimal>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].0.cmp(&right[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(left[i].1);
                ys.push(right[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

fn adjacent_months(a: NaiveDate, b: NaiveDate) -> bool {
    let index = |d: NaiveDate| d.year() * 12 + d.month() as i32;
    index(b) - index(a) == 1
}
