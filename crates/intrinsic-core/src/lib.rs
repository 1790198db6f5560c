pub mod config;
pub mod error;
pub mod market_data;
pub mod pipeline;
pub mod statements;
pub mod stats;
pub mod types;
pub mod valuation;

pub use config::ValuationConfig;
pub use error::{ErrorKind, IntrinsicError};
pub use pipeline::{BatchReport, Pipeline, TickerOutcome, ValuationReport};
pub use types::*;

/// Standard result type for all intrinsic-value operations
pub type IntrinsicResult<T> = Result<T, IntrinsicError>;
