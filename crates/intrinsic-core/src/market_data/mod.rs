pub mod fixture;
pub mod prices;
pub mod provider;
pub mod retry;

pub use fixture::{FixtureProvider, SymbolSnapshot};
pub use prices::{align_returns, Frequency, PricePoint, PriceSeries};
pub use provider::{CompanyProfile, MarketDataProvider};
pub use retry::{Backoff, RetryConfig, RetryingProvider};
