use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::warn;

use super::prices::PriceSeries;
use super::provider::{CompanyProfile, MarketDataProvider};
use crate::statements::StatementTable;
use crate::IntrinsicResult;

/// Specifies the backoff strategy between retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed { delay_ms: u64 },
    /// Delay is `base_ms * factor ^ attempt`, capped at `max_ms`.
    Exponential { base_ms: u64, factor: u32, max_ms: u64 },
}

/// Configuration for retrying provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub enabled: bool,
    /// The total number of attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::Exponential {
                base_ms: 500,
                factor: 2,
                max_ms: 4_000,
            },
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential {
                base_ms,
                factor,
                max_ms,
            } => {
                let multiplier = u64::from(factor).saturating_pow(attempt);
                base_ms.saturating_mul(multiplier).min(max_ms)
            }
        };
        Duration::from_millis(ms)
    }
}

/// Wraps a provider and retries calls that fail with a provider error.
///
/// Missing fields and insufficient data are returned immediately: the same
/// request would fail the same way.
#[derive(Debug, Clone)]
pub struct RetryingProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: MarketDataProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn call<T>(
        &self,
        op: &str,
        symbol: &str,
        f: impl Fn(&P) -> IntrinsicResult<T>,
    ) -> IntrinsicResult<T> {
        let mut attempt = 0;
        loop {
            match f(&self.inner) {
                Err(e)
                    if self.config.enabled
                        && e.is_retryable()
                        && attempt < self.config.max_retries =>
                {
                    let delay = self.config.delay_for(attempt);
                    warn!(
                        op = op,
                        symbol = symbol,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "provider call failed, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl<P: MarketDataProvider> MarketDataProvider for RetryingProvider<P> {
    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> IntrinsicResult<PriceSeries> {
        self.call("price_history", symbol, |p| p.price_history(symbol, start, end))
    }

    fn income_statement(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.call("income_statement", symbol, |p| p.income_statement(symbol))
    }

    fn balance_sheet(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.call("balance_sheet", symbol, |p| p.balance_sheet(symbol))
    }

    fn cash_flow(&self, symbol: &str) -> IntrinsicResult<StatementTable> {
        self.call("cash_flow", symbol, |p| p.cash_flow(symbol))
    }

    fn profile(&self, symbol: &str) -> IntrinsicResult<CompanyProfile> {
        self.call("profile", symbol, |p| p.profile(symbol))
    }
}
