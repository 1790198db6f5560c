use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntrinsicError {
    #[error("Missing field: {field} ({context})")]
    MissingField { field: String, context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid terminal value: {0}")]
    InvalidTerminalValue(String),

    #[error("Data provider failure for {symbol}: {reason}")]
    DataProvider { symbol: String, reason: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse error class, reported per ticker in batch output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingField,
    InsufficientData,
    InvalidTerminalValue,
    DataProvider,
    InvalidInput,
    DivisionByZero,
    Serialization,
}

impl IntrinsicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntrinsicError::MissingField { .. } => ErrorKind::MissingField,
            IntrinsicError::InsufficientData(_) => ErrorKind::InsufficientData,
            IntrinsicError::InvalidTerminalValue(_) => ErrorKind::InvalidTerminalValue,
            IntrinsicError::DataProvider { .. } => ErrorKind::DataProvider,
            IntrinsicError::InvalidInput { .. } => ErrorKind::InvalidInput,
            IntrinsicError::DivisionByZero { .. } => ErrorKind::DivisionByZero,
            IntrinsicError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    /// Only provider failures are transient; everything else is a property
    /// of the data and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IntrinsicError::DataProvider { .. })
    }

    pub(crate) fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        IntrinsicError::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for IntrinsicError {
    fn from(e: serde_json::Error) -> Self {
        IntrinsicError::SerializationError(e.to_string())
    }
}
