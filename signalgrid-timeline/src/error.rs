use crate::types::Ticker;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors generated while fetching the dashboard feed.
///
/// Every variant degrades to an empty [`HistoryStore`](crate::history::HistoryStore) at the
/// [`FeedClient::fetch_history`](crate::feed::FeedClient::fetch_history) boundary.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Request(String),

    #[error("feed request timed out")]
    Timeout,

    #[error("feed responded with HTTP status {0}")]
    Status(u16),

    #[error("feed document could not be parsed: {0}")]
    Parse(String),
}

impl FetchError {
    /// Determine if the failure is likely to clear on a later fetch.
    ///
    /// Only informs logging, nothing in the timeline retries automatically.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(_) | FetchError::Timeout => true,
            FetchError::Status(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_decode() {
            Self::Parse(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Request(value.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Errors raised for a single feed record. These are logged and the record dropped, they never
/// abort a normalisation or merge pass.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RecordError {
    #[error("record has no ticker")]
    MissingIdentifier,

    #[error("record is malformed: {0}")]
    Malformed(String),

    #[error("record {ticker}: field `{field}` has unparseable value {value:?}")]
    InvalidField {
        ticker: Ticker,
        field: &'static str,
        value: String,
    },

    #[error("historical record {0} has no baseline entity")]
    Unmatched(Ticker),
}

/// Errors raised when navigating a built timeline.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Error)]
pub enum TimelineError {
    #[error("position {index} out of range for history of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised while validating a [`TimelineConfig`](crate::config::TimelineConfig).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid feed url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_is_transient() {
        struct TestCase {
            input: FetchError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: transient w/ FetchError::Timeout
                input: FetchError::Timeout,
                expected: true,
            },
            TestCase {
                // TC1: transient w/ connection failure
                input: FetchError::Request("connection refused".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: transient w/ server error status
                input: FetchError::Status(503),
                expected: true,
            },
            TestCase {
                // TC3: transient w/ rate limited status
                input: FetchError::Status(429),
                expected: true,
            },
            TestCase {
                // TC4: not transient w/ missing document
                input: FetchError::Status(404),
                expected: false,
            },
            TestCase {
                // TC5: not transient w/ unparseable document
                input: FetchError::Parse("expected value at line 1 column 1".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_transient();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_fetch_error_from_serde_json() {
        let error = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        assert!(matches!(FetchError::from(error), FetchError::Parse(_)));
    }

    #[test]
    fn test_record_error_display() {
        let error = RecordError::InvalidField {
            ticker: Ticker::from("AAPL"),
            field: "sma_50",
            value: "n/a".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "record AAPL: field `sma_50` has unparseable value \"n/a\""
        );
    }
}
