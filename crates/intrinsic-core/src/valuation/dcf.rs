use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use super::growth::{total_current_assets, total_current_liabilities};
use super::CompanyData;
use crate::error::IntrinsicError;
use crate::statements::{FinancialStatementSet, LineItem, StatementSource};
use crate::stats;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One complete historical year used to derive forecast assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalYear {
    pub fiscal_year: i32,
    pub revenue: Money,
    pub ebit: Money,
    pub tax: Money,
    pub depreciation: Money,
    /// Absolute capital expenditure
    pub capex: Money,
    pub working_capital: Money,
}

/// Historical years that report every line the forecast needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalFundamentals {
    pub ticker: String,
    pub years: Vec<HistoricalYear>,
}

/// Forecast drivers, each the median of its historical ratio series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub revenue_growth: Rate,
    pub ebit_margin: Rate,
    pub capex_pct_revenue: Rate,
    pub depreciation_pct_revenue: Rate,
    pub working_capital_pct_revenue: Rate,
    pub tax_rate: Rate,
}

/// A single projected year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRow {
    pub year: u32,
    pub revenue_growth: Rate,
    pub revenue: Money,
    pub ebit: Money,
    pub tax: Money,
    pub nopat: Money,
    pub depreciation: Money,
    pub capex: Money,
    pub working_capital: Money,
    pub delta_working_capital: Money,
    pub fcff: Money,
    pub discount_factor: Rate,
    pub pv_fcff: Money,
}

/// Balance-sheet claims subtracted from firm value to reach equity value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityBridge {
    pub total_debt: Money,
    pub cash: Money,
    pub minority_interest: Money,
    /// Fiscal year the bridge was read from (None when supplied directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    /// False when the balance sheet carries no minority interest line
    #[serde(default = "default_true")]
    pub minority_interest_reported: bool,
}

impl Default for EquityBridge {
    fn default() -> Self {
        Self {
            total_debt: Decimal::ZERO,
            cash: Decimal::ZERO,
            minority_interest: Decimal::ZERO,
            fiscal_year: None,
            minority_interest_reported: true,
        }
    }
}

/// Input for the projection-and-discount step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfInput {
    /// Latest actual revenue; forecast growth compounds on it
    pub base_revenue: Money,
    pub assumptions: Assumptions,
    /// Discount rate
    pub wacc: Rate,
    /// Gordon growth rate for the terminal value
    pub terminal_growth: Rate,
    /// Explicit forecast horizon in years
    #[serde(default = "default_forecast_years")]
    pub forecast_years: u32,
    /// Final-year growth as a fraction of the initial growth
    #[serde(default = "default_growth_fade")]
    pub growth_fade: Rate,
    #[serde(default)]
    pub bridge: EquityBridge,
    pub shares_outstanding: Decimal,
}

/// Output of the projection-and-discount step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfOutput {
    pub forecast: Vec<ForecastRow>,
    /// FCFF_N * (1 + g) / (WACC - g)
    pub terminal_value: Money,
    pub pv_of_fcff: Money,
    pub pv_of_terminal: Money,
    /// PV(FCFF) + PV(TV)
    pub firm_value: Money,
    /// Firm value - debt + cash - minority interest
    pub equity_value: Money,
    pub intrinsic_value_per_share: Money,
    /// PV(TV) / firm value
    pub terminal_value_pct: Rate,
    pub wacc: Rate,
    pub terminal_growth: Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

/// Intrinsic value against the market price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub intrinsic_value_per_share: Money,
    pub market_price_per_share: Money,
    /// intrinsic / market - 1, when the market price is positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upside: Option<Rate>,
    pub recommendation: Recommendation,
}

/// Horizon and growth fade for `value_company`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfParams {
    pub forecast_years: u32,
    pub growth_fade: Rate,
}

impl Default for DcfParams {
    fn default() -> Self {
        Self {
            forecast_years: default_forecast_years(),
            growth_fade: default_growth_fade(),
        }
    }
}

/// Everything `value_company` derived for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyValuation {
    pub history: HistoricalFundamentals,
    pub assumptions: Assumptions,
    pub bridge: EquityBridge,
    pub dcf: DcfOutput,
    pub valuation: ValuationResult,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl HistoricalFundamentals {
    /// Collect the complete historical years from aligned statements.
    ///
    /// Working capital is the reported line when present, otherwise current
    /// assets minus current liabilities. Years missing any line are dropped.
    pub fn from_statements(statements: &FinancialStatementSet) -> IntrinsicResult<Self> {
        let years = statements.years();
        let revenue = statements.series(StatementSource::Income, LineItem::TotalRevenue, years)?;
        let ebit = statements.series(StatementSource::Income, LineItem::Ebit, years)?;
        let tax = statements.series(StatementSource::Income, LineItem::TaxProvision, years)?;
        let depreciation =
            statements.series(StatementSource::CashFlow, LineItem::Depreciation, years)?;
        let capex =
            statements.series(StatementSource::CashFlow, LineItem::CapitalExpenditure, years)?;
        let working_capital = working_capital_series(statements)?;

        let rows: Vec<HistoricalYear> = years
            .iter()
            .filter_map(|&y| {
                Some(HistoricalYear {
                    fiscal_year: y,
                    revenue: lookup(&revenue, y)?,
                    ebit: lookup(&ebit, y)?,
                    tax: lookup(&tax, y)?,
                    depreciation: lookup(&depreciation, y)?,
                    capex: lookup(&capex, y)?.abs(),
                    working_capital: lookup(&working_capital, y)?,
                })
            })
            .collect();

        if rows.len() < 2 {
            return Err(IntrinsicError::InsufficientData(format!(
                "{}: {} complete historical years, need at least 2 for revenue growth",
                statements.ticker,
                rows.len()
            )));
        }

        Ok(Self {
            ticker: statements.ticker.clone(),
            years: rows,
        })
    }

    pub fn latest(&self) -> Option<&HistoricalYear> {
        self.years.last()
    }
}

impl Assumptions {
    /// Medians of the historical ratio series.
    pub fn from_history(history: &HistoricalFundamentals) -> IntrinsicResult<Self> {
        let rows = &history.years;
        let ticker = &history.ticker;

        if rows.iter().any(|r| r.revenue.is_zero()) {
            return Err(IntrinsicError::DivisionByZero {
                context: format!("{ticker}: revenue ratios with zero revenue"),
            });
        }

        let growth: Vec<Rate> = rows
            .windows(2)
            .map(|w| w[1].revenue / w[0].revenue - Decimal::ONE)
            .collect();
        let tax_rates: Vec<Rate> = rows
            .iter()
            .filter(|r| !r.ebit.is_zero())
            .map(|r| r.tax / r.ebit)
            .collect();

        let median = |values: &[Rate], name: &str| {
            stats::median(values).ok_or_else(|| {
                IntrinsicError::InsufficientData(format!("{ticker}: no values for {name}"))
            })
        };

        Ok(Self {
            revenue_growth: median(&growth, "revenue growth")?,
            ebit_margin: median(&revenue_ratio(rows, |r| r.ebit), "EBIT margin")?,
            capex_pct_revenue: median(&revenue_ratio(rows, |r| r.capex), "CapEx % of revenue")?,
            depreciation_pct_revenue: median(
                &revenue_ratio(rows, |r| r.depreciation),
                "depreciation % of revenue",
            )?,
            working_capital_pct_revenue: median(
                &revenue_ratio(rows, |r| r.working_capital),
                "working capital % of revenue",
            )?,
            tax_rate: median(&tax_rates, "tax / EBIT")?,
        })
    }
}

impl EquityBridge {
    /// Debt, cash and minority interest from the most recent balance-sheet
    /// period that reports them.
    pub fn from_statements(statements: &FinancialStatementSet) -> IntrinsicResult<Self> {
        let balance = statements.table(StatementSource::Balance);
        let minority_reported = balance.has(LineItem::MinorityInterest);

        let period = balance
            .periods()
            .iter()
            .rev()
            .find(|p| {
                p.get(LineItem::TotalDebt).is_some()
                    && p.get(LineItem::CashAndEquivalents).is_some()
                    && (!minority_reported || p.get(LineItem::MinorityInterest).is_some())
            })
            .ok_or_else(|| {
                IntrinsicError::missing(
                    "Total Debt / Cash",
                    format!("{} balance sheet: no period reports the equity bridge", statements.ticker),
                )
            })?;

        Ok(Self {
            total_debt: period.get(LineItem::TotalDebt).unwrap_or_default(),
            cash: period.get(LineItem::CashAndEquivalents).unwrap_or_default(),
            minority_interest: period.get(LineItem::MinorityInterest).unwrap_or_default(),
            fiscal_year: Some(period.fiscal_year()),
            minority_interest_reported: minority_reported,
        })
    }

    /// Firm value - debt + cash - minority interest.
    pub fn equity_value(&self, firm_value: Money) -> Money {
        firm_value - self.total_debt + self.cash - self.minority_interest
    }
}

impl Recommendation {
    /// BUY above the market price, SELL below, HOLD on exact equality.
    pub fn classify(intrinsic: Money, market: Money) -> Self {
        match intrinsic.cmp(&market) {
            std::cmp::Ordering::Greater => Recommendation::Buy,
            std::cmp::Ordering::Less => Recommendation::Sell,
            std::cmp::Ordering::Equal => Recommendation::Hold,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

impl ValuationResult {
    pub fn new(ticker: &str, intrinsic: Money, market: Money) -> Self {
        let upside = if market > Decimal::ZERO {
            Some(intrinsic / market - Decimal::ONE)
        } else {
            None
        };
        Self {
            ticker: ticker.to_string(),
            intrinsic_value_per_share: intrinsic,
            market_price_per_share: market,
            upside,
            recommendation: Recommendation::classify(intrinsic, market),
        }
    }
}

/// Linear growth fade: g0 in year 1 to `fade * g0` after N years.
///
/// growth_t = g0 + (fade * g0 - g0) * (t - 1) / N
pub fn faded_growth_rates(initial: Rate, fade: Rate, years: u32) -> Vec<Rate> {
    let n = Decimal::from(years);
    let step = initial * fade - initial;
    (1..=years)
        .map(|t| initial + step * Decimal::from(t - 1) / n)
        .collect()
}

/// Project FCFF from the latest actual revenue with constant margins.
///
/// ΔWC of year 1 is zero; later years diff against the prior forecast year.
/// A horizon long enough to overflow compounding is `InvalidInput`.
pub fn project_fcff(
    base_revenue: Money,
    assumptions: &Assumptions,
    growth_rates: &[Rate],
    wacc: Rate,
) -> IntrinsicResult<Vec<ForecastRow>> {
    let mut rows: Vec<ForecastRow> = Vec::with_capacity(growth_rates.len());
    let mut revenue = base_revenue;
    let mut previous_wc: Option<Money> = None;

    for (idx, &growth) in growth_rates.iter().enumerate() {
        let year = idx as u32 + 1;
        revenue = revenue
            .checked_mul(Decimal::ONE + growth)
            .ok_or_else(|| horizon_overflow(year, "revenue"))?;

        let ebit = revenue * assumptions.ebit_margin;
        let tax = ebit * assumptions.tax_rate;
        let nopat = ebit - tax;
        let depreciation = revenue * assumptions.depreciation_pct_revenue;
        let capex = revenue * assumptions.capex_pct_revenue;
        let working_capital = revenue * assumptions.working_capital_pct_revenue;
        let delta_working_capital = previous_wc.map_or(Decimal::ZERO, |prev| working_capital - prev);

        // FCFF = NOPAT + D&A - CapEx - ΔWC
        let fcff = nopat + depreciation - capex - delta_working_capital;
        let discount_factor = Decimal::ONE / compound(wacc, year)?;

        rows.push(ForecastRow {
            year,
            revenue_growth: growth,
            revenue,
            ebit,
            tax,
            nopat,
            depreciation,
            capex,
            working_capital,
            delta_working_capital,
            fcff,
            discount_factor,
            pv_fcff: fcff * discount_factor,
        });
        previous_wc = Some(working_capital);
    }

    Ok(rows)
}

/// Gordon growth terminal value.
pub fn terminal_value(final_fcff: Money, wacc: Rate, terminal_growth: Rate) -> IntrinsicResult<Money> {
    if wacc <= terminal_growth {
        return Err(IntrinsicError::InvalidTerminalValue(format!(
            "WACC ({wacc}) must exceed terminal growth ({terminal_growth})"
        )));
    }
    (final_fcff * (Decimal::ONE + terminal_growth))
        .checked_div(wacc - terminal_growth)
        .ok_or_else(|| {
            IntrinsicError::InvalidTerminalValue(format!(
                "Terminal value overflows: WACC ({wacc}) is too close to terminal growth ({terminal_growth})"
            ))
        })
}

/// Project, discount and bridge to a per-share value.
pub fn calculate_dcf(input: &DcfInput) -> IntrinsicResult<ComputationOutput<DcfOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_dcf_input(input)?;

    let n = input.forecast_years;
    let wacc = input.wacc;
    let g = input.terminal_growth;

    let growth_rates = faded_growth_rates(input.assumptions.revenue_growth, input.growth_fade, n);
    let forecast = project_fcff(input.base_revenue, &input.assumptions, &growth_rates, wacc)?;
    let last = forecast.last().ok_or_else(|| {
        IntrinsicError::InsufficientData("No forecast years generated".into())
    })?;

    let tv = terminal_value(last.fcff, wacc, g)?;
    let pv_of_fcff: Money = forecast.iter().map(|r| r.pv_fcff).sum();
    let pv_of_terminal = tv / compound(wacc, n)?;
    let firm_value = pv_of_fcff + pv_of_terminal;

    let tv_pct = if firm_value.is_zero() {
        Decimal::ZERO
    } else {
        pv_of_terminal / firm_value
    };
    if tv_pct > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of firm value; consider extending the explicit forecast period",
            tv_pct * dec!(100)
        ));
    }
    if last.fcff < Decimal::ZERO {
        warnings.push(format!(
            "Final-year FCFF is negative ({}); the terminal value is negative",
            last.fcff
        ));
    }
    if !input.bridge.minority_interest_reported {
        warnings.push("No minority interest line in the balance sheet; treated as zero".into());
    }

    let equity_value = input.bridge.equity_value(firm_value);
    if equity_value < Decimal::ZERO {
        warnings.push(format!("Equity value is negative ({equity_value})"));
    }
    let intrinsic_value_per_share = equity_value / input.shares_outstanding;

    let output = DcfOutput {
        forecast,
        terminal_value: tv,
        pv_of_fcff,
        pv_of_terminal,
        firm_value,
        equity_value,
        intrinsic_value_per_share,
        terminal_value_pct: tv_pct,
        wacc,
        terminal_growth: g,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "FCFF DCF with fading revenue growth and Gordon terminal value",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Value one company: history -> assumptions -> forecast -> per-share verdict.
pub fn value_company(
    company: &CompanyData,
    wacc: Rate,
    terminal_growth: Rate,
    params: &DcfParams,
) -> IntrinsicResult<ComputationOutput<CompanyValuation>> {
    let start = Instant::now();
    let ticker = company.ticker();

    let history = HistoricalFundamentals::from_statements(&company.statements)?;
    let assumptions = Assumptions::from_history(&history)?;
    let bridge = EquityBridge::from_statements(&company.statements)?;
    let base_revenue = history
        .latest()
        .map(|y| y.revenue)
        .ok_or_else(|| IntrinsicError::InsufficientData(format!("{ticker}: no revenue history")))?;

    debug!(ticker, ?assumptions, "dcf assumptions");

    let input = DcfInput {
        base_revenue,
        assumptions: assumptions.clone(),
        wacc,
        terminal_growth,
        forecast_years: params.forecast_years,
        growth_fade: params.growth_fade,
        bridge: bridge.clone(),
        shares_outstanding: company.profile.shares_outstanding,
    };
    let dcf = calculate_dcf(&input)?;

    let valuation = ValuationResult::new(
        ticker,
        dcf.result.intrinsic_value_per_share,
        company.profile.current_price,
    );

    let result = CompanyValuation {
        history,
        assumptions,
        bridge,
        dcf: dcf.result,
        valuation,
    };
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Historical-median assumptions into an FCFF DCF",
        &input,
        dcf.warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_forecast_years() -> u32 {
    5
}

fn default_growth_fade() -> Rate {
    dec!(0.6)
}

fn validate_dcf_input(input: &DcfInput) -> IntrinsicResult<()> {
    if input.base_revenue <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "base_revenue".into(),
            reason: "Base revenue must be positive".into(),
        });
    }
    if input.wacc <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "wacc".into(),
            reason: "WACC must be positive".into(),
        });
    }
    if input.forecast_years == 0 {
        return Err(IntrinsicError::InvalidInput {
            field: "forecast_years".into(),
            reason: "At least one forecast year is required".into(),
        });
    }
    if input.growth_fade < Decimal::ZERO || input.growth_fade > Decimal::ONE {
        return Err(IntrinsicError::InvalidInput {
            field: "growth_fade".into(),
            reason: "Growth fade must be between 0 and 1".into(),
        });
    }
    if input.shares_outstanding <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "shares_outstanding".into(),
            reason: "Shares outstanding must be positive".into(),
        });
    }
    Ok(())
}

/// (1 + rate)^years, or `InvalidInput` when it overflows.
fn compound(rate: Rate, years: u32) -> IntrinsicResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powu(u64::from(years))
        .ok_or_else(|| horizon_overflow(years, "discount factor"))
}

fn horizon_overflow(year: u32, what: &str) -> IntrinsicError {
    IntrinsicError::InvalidInput {
        field: "forecast_years".into(),
        reason: format!("Forecast horizon too long: {what} overflows in year {year}"),
    }
}

fn working_capital_series(
    statements: &FinancialStatementSet,
) -> IntrinsicResult<Vec<(i32, Money)>> {
    let balance = statements.table(StatementSource::Balance);
    if balance.has(LineItem::WorkingCapital) {
        return statements.full_series(StatementSource::Balance, LineItem::WorkingCapital);
    }
    let assets = total_current_assets(balance)?;
    let liabilities = total_current_liabilities(balance)?;
    Ok(assets
        .iter()
        .filter_map(|&(y, a)| lookup(&liabilities, y).map(|l| (y, a - l)))
        .collect())
}

fn revenue_ratio(rows: &[HistoricalYear], line: impl Fn(&HistoricalYear) -> Money) -> Vec<Rate> {
    rows.iter().map(|r| line(r) / r.revenue).collect()
}

fn lookup(series: &[(i32, Decimal)], year: i32) -> Option<Decimal> {
    series.iter().find(|(y, _)| *y == year).map(|(_, v)| *v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
