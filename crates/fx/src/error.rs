//! Error types for rate lookups.
//!
//! None of these reach callers of [`crate::CurrencyConverter`]: they decide
//! which fallback tier answers and are logged on the way.

use thiserror::Error;

/// Result type for rate operations.
pub type FxResult<T> = Result<T, FxError>;

#[derive(Debug, Error)]
pub enum FxError {
    /// Transport failure, including connect and read timeouts.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("HTTP {status} from rate provider")]
    Status { status: u16 },

    /// The provider answered but the body is not a usable rate set.
    #[error("Malformed rate payload: {0}")]
    Payload(String),

    /// No answer within the configured timeout.
    #[error("Rate fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Cache file could not be read or written.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache file is not valid JSON.
    #[error("Cache format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FxError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
