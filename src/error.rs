//! Error types for the bidder library.

use std::time::Duration;

use thiserror::Error;

/// The main error type for all bidder operations.
#[derive(Error, Debug)]
pub enum BidderError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Marketplace API returned an error
    #[error("Marketplace API error: {0}")]
    Api(ApiError),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_ms:?}ms")]
    RateLimited {
        /// Suggested wait time in milliseconds before retrying
        retry_after_ms: Option<u64>,
    },

    /// A submission exhausted its retry budget
    #[error("Submission failed after {attempts} attempts: {reason}")]
    SubmissionFailed {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Last error encountered
        reason: String,
    },

    /// No wallet slot became available within the wait budget
    #[error("No wallet available after waiting {waited_ms}ms")]
    WalletUnavailable {
        /// How long the caller waited before giving up
        waited_ms: u64,
    },

    /// Signing or authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid configuration (bad credentials, empty pool)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid response from the API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout
    #[error("Request timed out")]
    Timeout,
}

/// Marketplace API error codes and messages.
///
/// These are errors returned by the marketplace itself in the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The error code from the marketplace (e.g., "BID_EXISTS")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl ApiError {
    /// Create a new API error from code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Parse an API error from the marketplace's error string format.
    ///
    /// The marketplace returns errors as `"CODE: message"`.
    pub fn from_error_string(error: &str) -> Self {
        let parts: Vec<&str> = error.splitn(2, ':').collect();
        if parts.len() == 2 {
            Self::new(parts[0].trim(), parts[1].trim())
        } else {
            Self::new("UNKNOWN", error.trim())
        }
    }

    /// Get the full error string in the marketplace's format (code: message).
    pub fn full_code(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        self.code == error_codes::RATE_LIMITED
            || self.message.to_ascii_lowercase().contains("rate limit")
    }

    /// Check if this is a duplicate/conflicting bid error.
    ///
    /// The marketplace rejects a new bid when the same wallet already has an
    /// active bid for the target. The conflicting bid must be cancelled first.
    pub fn is_duplicate_bid(&self) -> bool {
        self.code == error_codes::BID_EXISTS
            || self
                .message
                .to_ascii_lowercase()
                .contains("already have an active bid")
    }

    /// Check if this is an insufficient funds error.
    pub fn is_insufficient_funds(&self) -> bool {
        self.code == error_codes::INSUFFICIENT_FUNDS
            || self.message.to_ascii_lowercase().contains("insufficient")
    }

    /// Check if this is an unknown bid error.
    pub fn is_bid_not_found(&self) -> bool {
        self.code == error_codes::BID_NOT_FOUND
    }

    /// Extract a recoverable wait duration from the error message, if present.
    ///
    /// Recognizes the marketplace's `"retry in N minutes"` / `"retry in N
    /// seconds"` phrasing.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(&self.message)
    }
}

/// Parse a `"retry in N minutes"` / `"retry in N seconds"` phrase.
///
/// Returns `None` when no recognizable duration is present, in which case
/// callers fall back to their configured default pause.
pub(crate) fn parse_retry_after(message: &str) -> Option<Duration> {
    let lower = message.to_ascii_lowercase();
    let rest = lower.split("retry in ").nth(1)?;
    let mut words = rest.split_whitespace();
    let amount: u64 = words.next()?.parse().ok()?;
    let unit = words.next()?;

    if unit.starts_with("min") {
        Some(Duration::from_secs(amount * 60))
    } else if unit.starts_with("sec") {
        Some(Duration::from_secs(amount))
    } else if unit.starts_with("hour") {
        Some(Duration::from_secs(amount * 3600))
    } else {
        None
    }
}

/// Known marketplace error codes for pattern matching.
pub mod error_codes {
    /// Wallet already has an active bid for the target.
    pub const BID_EXISTS: &str = "BID_EXISTS";
    /// The referenced bid does not exist or was already cancelled.
    pub const BID_NOT_FOUND: &str = "BID_NOT_FOUND";
    /// Too many requests; the message may carry a retry-in duration.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    /// Wallet balance cannot cover the bid.
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    /// Bid price below the collection's floor requirement.
    pub const PRICE_TOO_LOW: &str = "PRICE_TOO_LOW";
    /// Signature did not verify against the action address.
    pub const INVALID_SIGNATURE: &str = "INVALID_SIGNATURE";
    /// Bid expiry outside the accepted range.
    pub const INVALID_EXPIRY: &str = "INVALID_EXPIRY";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_string() {
        let error = ApiError::from_error_string("BID_EXISTS: you already have an active bid");
        assert_eq!(error.code, "BID_EXISTS");
        assert_eq!(error.message, "you already have an active bid");
        assert!(error.is_duplicate_bid());
    }

    #[test]
    fn test_api_error_without_code() {
        let error = ApiError::from_error_string("something went wrong");
        assert_eq!(error.code, "UNKNOWN");
        assert_eq!(error.message, "something went wrong");
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::new("INSUFFICIENT_FUNDS", "balance too low");
        assert_eq!(error.to_string(), "INSUFFICIENT_FUNDS: balance too low");
    }

    #[test]
    fn test_rate_limit_classification() {
        let by_code = ApiError::new("RATE_LIMITED", "slow down");
        assert!(by_code.is_rate_limited());

        let by_message = ApiError::new("UNKNOWN", "Rate limit exceeded, retry in 2 minutes");
        assert!(by_message.is_rate_limited());
    }

    #[test]
    fn test_retry_after_minutes() {
        let error = ApiError::new("RATE_LIMITED", "too many requests, retry in 5 minutes");
        assert_eq!(error.retry_after(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_retry_after_seconds() {
        let error = ApiError::new("RATE_LIMITED", "retry in 30 seconds");
        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_absent() {
        let error = ApiError::new("RATE_LIMITED", "too many requests");
        assert_eq!(error.retry_after(), None);
    }

    #[test]
    fn test_retry_after_garbage() {
        assert_eq!(parse_retry_after("retry in soon minutes"), None);
        assert_eq!(parse_retry_after("retry in 5 fortnights"), None);
    }
}
