use chrono::{Local, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::IntrinsicError;
use crate::market_data::{Frequency, RetryConfig};
use crate::types::Rate;
use crate::valuation::beta::EstimationWindow;
use crate::valuation::dcf::DcfParams;
use crate::valuation::growth::LtgrParams;
use crate::IntrinsicResult;

/// Run configuration for a batch valuation.
///
/// Every field has a default, so a file only needs the peer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Peer universe for the median unlevered beta
    pub peers: Vec<String>,
    /// Tickers to value; the peer list when empty
    pub tickers: Vec<String>,
    /// Market index the betas and ERP are measured against
    pub market_index: String,
    /// End of the estimation window; today when unset
    pub valuation_date: Option<NaiveDate>,
    /// Length of the price and beta statement window
    pub lookback_years: u32,
    pub forecast_years: u32,
    pub risk_free_rate: Rate,
    pub terminal_growth_ceiling: Rate,
    /// Trailing statement years averaged for WACC capital structure
    pub capital_structure_years: usize,
    /// Final-year revenue growth as a fraction of the historical median
    pub growth_fade: Rate,
    /// NOPAT tax rate when no effective rate can be measured
    pub fallback_tax_rate: Rate,
    pub frequency: Frequency,
    pub retry: RetryConfig,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            tickers: Vec::new(),
            market_index: "^NSEI".to_string(),
            valuation_date: None,
            lookback_years: 6,
            forecast_years: 5,
            risk_free_rate: dec!(0.072),
            terminal_growth_ceiling: dec!(0.06),
            capital_structure_years: 3,
            growth_fade: dec!(0.6),
            fallback_tax_rate: dec!(0.30),
            frequency: Frequency::MonthEnd,
            retry: RetryConfig::default(),
        }
    }
}

impl ValuationConfig {
    pub fn validate(&self) -> IntrinsicResult<()> {
        if self.peers.is_empty() {
            return Err(invalid("peers", "At least one peer ticker is required"));
        }
        if self.market_index.trim().is_empty() {
            return Err(invalid("market_index", "Market index ticker is required"));
        }
        if self.lookback_years == 0 {
            return Err(invalid("lookback_years", "Lookback window must be at least one year"));
        }
        if self.forecast_years == 0 {
            return Err(invalid("forecast_years", "Forecast horizon must be at least one year"));
        }
        if self.capital_structure_years == 0 {
            return Err(invalid(
                "capital_structure_years",
                "Capital structure window must be at least one year",
            ));
        }
        for (field, rate) in [
            ("risk_free_rate", self.risk_free_rate),
            ("terminal_growth_ceiling", self.terminal_growth_ceiling),
        ] {
            if rate <= dec!(-1) || rate >= Decimal::ONE {
                return Err(invalid(field, "Rate must be between -1 and 1 (exclusive)"));
            }
        }
        if self.growth_fade < Decimal::ZERO || self.growth_fade > Decimal::ONE {
            return Err(invalid("growth_fade", "Growth fade must be between 0 and 1"));
        }
        if self.fallback_tax_rate < Decimal::ZERO || self.fallback_tax_rate >= Decimal::ONE {
            return Err(invalid("fallback_tax_rate", "Fallback tax rate must be in [0, 1)"));
        }
        Ok(())
    }

    /// Tickers to value.
    pub fn targets(&self) -> &[String] {
        if self.tickers.is_empty() {
            &self.peers
        } else {
            &self.tickers
        }
    }

    pub fn valuation_date(&self) -> NaiveDate {
        self.valuation_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// `lookback_years` ending on the valuation date.
    pub fn estimation_window(&self) -> IntrinsicResult<EstimationWindow> {
        let end = self.valuation_date();
        let start = end
            .checked_sub_months(Months::new(self.lookback_years.saturating_mul(12)))
            .ok_or_else(|| invalid("lookback_years", "Lookback window starts before the calendar"))?;
        Ok(EstimationWindow {
            start,
            end,
            frequency: self.frequency,
        })
    }

    pub fn dcf_params(&self) -> DcfParams {
        DcfParams {
            forecast_years: self.forecast_years,
            growth_fade: self.growth_fade,
        }
    }

    pub fn ltgr_params(&self) -> LtgrParams {
        LtgrParams {
            ceiling: self.terminal_growth_ceiling,
            fallback_tax_rate: self.fallback_tax_rate,
        }
    }
}

fn invalid(field: &str, reason: &str) -> IntrinsicError {
    IntrinsicError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}
