//! Error types for the market data crate.

use thiserror::Error;

/// Type alias for Result using [`MarketError`].
pub type Result<T> = std::result::Result<T, MarketError>;

/// Errors that can occur while fetching or reducing market statistics.
#[derive(Error, Debug)]
pub enum MarketError {
    /// The statistics API returned a non-success, non-throttling status.
    /// This is terminal for the current batch - no retry is attempted.
    #[error("Market API HTTP {status}")]
    Http {
        /// The HTTP status code returned by the API
        status: u16,
    },

    /// The API kept throttling past the configured retry limit.
    #[error("Rate limited after {attempts} attempts")]
    RateLimitExhausted {
        /// Number of retries performed before giving up
        attempts: u32,
    },

    /// A network-level error occurred while talking to the API.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API responded with a body that could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MarketError {
    /// Whether the error represents a throttling response that the
    /// fetcher should retry with backoff. Everything else surfaces
    /// immediately to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { status: 429 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_status_is_retryable() {
        assert!(MarketError::Http { status: 429 }.is_retryable());
    }

    #[test]
    fn test_server_error_is_not_retryable() {
        assert!(!MarketError::Http { status: 500 }.is_retryable());
        assert!(!MarketError::RateLimitExhausted { attempts: 6 }.is_retryable());
        assert!(!MarketError::InvalidResponse("bad json".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let error = MarketError::Http { status: 502 };
        assert_eq!(format!("{}", error), "Market API HTTP 502");

        let error = MarketError::RateLimitExhausted { attempts: 6 };
        assert_eq!(format!("{}", error), "Rate limited after 6 attempts");
    }
}
