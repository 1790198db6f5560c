#![allow(dead_code)]

use chrono::NaiveDate;
use intrinsic_core::market_data::{
    CompanyProfile, FixtureProvider, PricePoint, RetryConfig, SymbolSnapshot,
};
use intrinsic_core::statements::{StatementPeriod, StatementTable};
use intrinsic_core::ValuationConfig;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

pub const INDEX: &str = "^IDX";

/// Monthly observations from January 2020 to November 2025.
pub const MONTHS: usize = 71;

pub fn valuation_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()
}

pub fn month_end(i: usize) -> NaiveDate {
    let year = 2020 + (i / 12) as i32;
    let month = (i % 12) as u32 + 1;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.unwrap().pred_opt().unwrap()
}

/// Deterministic monthly index returns, mean 1% a month.
pub fn market_returns() -> Vec<Decimal> {
    let cycle = [
        dec!(0.03),
        dec!(-0.01),
        dec!(0.02),
        dec!(0.01),
        dec!(-0.005),
        dec!(0.015),
    ];
    (0..MONTHS - 1).map(|i| cycle[i % cycle.len()]).collect()
}

/// Month-end closes whose log returns are exactly `returns`.
pub fn price_path(start: Decimal, returns: &[Decimal]) -> Vec<PricePoint> {
    let mut cumulative = Decimal::ZERO;
    let mut points = vec![PricePoint {
        date: month_end(0),
        close: start,
    }];
    for (i, r) in returns.iter().enumerate() {
        cumulative += r;
        points.push(PricePoint {
            date: month_end(i + 1),
            close: start * cumulative.exp(),
        });
    }
    points
}

#[derive(Debug, Clone)]
pub struct CompanySpec {
    pub symbol: &'static str,
    pub beta: Decimal,
    pub debt: Decimal,
    pub shares: Decimal,
    pub current_price: Decimal,
    pub base_revenue: Decimal,
    pub growth: Decimal,
    pub ebit_margin: Decimal,
    /// Tax provision as a share of pretax income
    pub tax_rate: Decimal,
    /// Leave "Net PPE" out of the balance sheet
    pub drop_fixed_assets: bool,
}

impl CompanySpec {
    pub fn new(symbol: &'static str, beta: Decimal, debt: Decimal) -> Self {
        Self {
            symbol,
            beta,
            debt,
            shares: dec!(100),
            current_price: dec!(150),
            base_revenue: dec!(5000),
            growth: dec!(0.08),
            ebit_margin: dec!(0.20),
            tax_rate: dec!(0.25),
            drop_fixed_assets: false,
        }
    }
}

/// Five fiscal years (FY2021 to FY2025) of consistent statements plus a
/// price path with the planted beta.
pub fn company(spec: &CompanySpec) -> SymbolSnapshot {
    let mut income = Vec::new();
    let mut balance = Vec::new();
    let mut cashflow = Vec::new();
    let mut revenue = spec.base_revenue;

    for k in 0..5 {
        let date = NaiveDate::from_ymd_opt(2021 + k, 3, 31).unwrap();
        if k > 0 {
            revenue *= Decimal::ONE + spec.growth;
        }
        let ebit = revenue * spec.ebit_margin;
        let interest = spec.debt * dec!(0.08);
        let pretax = ebit - interest;

        income.push(
            StatementPeriod::new(date)
                .with("Total Revenue", revenue)
                .with("EBIT", ebit)
                .with("Interest Expense", interest)
                .with("Pretax Income", pretax)
                .with("Tax Provision", pretax * spec.tax_rate),
        );

        let mut b = StatementPeriod::new(date)
            .with("Total Debt", spec.debt)
            .with("Cash Cash Equivalents And Short Term Investments", revenue * dec!(0.10))
            .with("Minority Interest", revenue * dec!(0.01))
            .with("Accounts Receivable", revenue * dec!(0.20))
            .with("Inventory", revenue * dec!(0.10))
            .with("Accounts Payable", revenue * dec!(0.15))
            .with("Working Capital", revenue * dec!(0.15));
        if !spec.drop_fixed_assets {
            b = b.with("Net PPE", revenue * dec!(0.50));
        }
        balance.push(b);

        cashflow.push(
            StatementPeriod::new(date)
                .with("Depreciation", revenue * dec!(0.04))
                .with("Capital Expenditure", revenue * dec!(-0.06)),
        );
    }

    let returns: Vec<Decimal> = market_returns()
        .iter()
        .map(|m| dec!(0.001) + spec.beta * m)
        .collect();

    SymbolSnapshot {
        profile: Some(CompanyProfile {
            symbol: spec.symbol.to_string(),
            name: format!("{} Ltd", spec.symbol),
            shares_outstanding: spec.shares,
            current_price: spec.current_price,
        }),
        prices: price_path(dec!(100), &returns),
        income: StatementTable::new(income).unwrap(),
        balance: StatementTable::new(balance).unwrap(),
        cashflow: StatementTable::new(cashflow).unwrap(),
    }
}

pub fn index_snapshot() -> SymbolSnapshot {
    SymbolSnapshot {
        prices: price_path(dec!(1000), &market_returns()),
        ..SymbolSnapshot::default()
    }
}

pub fn peer_specs() -> Vec<CompanySpec> {
    vec![
        CompanySpec::new("AAA", dec!(0.9), dec!(1000)),
        CompanySpec::new("BBB", dec!(1.2), dec!(500)),
        CompanySpec::new("CCC", dec!(1.5), dec!(2000)),
    ]
}

pub fn provider(specs: &[CompanySpec]) -> FixtureProvider {
    specs.iter().fold(
        FixtureProvider::new().with_symbol(INDEX, index_snapshot()),
        |p, spec| p.with_symbol(spec.symbol, company(spec)),
    )
}

pub fn config(peers: &[&str]) -> ValuationConfig {
    ValuationConfig {
        peers: peers.iter().map(|s| s.to_string()).collect(),
        market_index: INDEX.to_string(),
        valuation_date: Some(valuation_date()),
        retry: RetryConfig::disabled(),
        ..ValuationConfig::default()
    }
}
