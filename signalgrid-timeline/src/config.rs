//! Timeline configuration and `SIGNALGRID_*` environment overrides.

use crate::{error::ConfigError, playback::DEFAULT_TICK_INTERVAL, window::DEFAULT_WINDOW_SPAN};
use chrono::TimeDelta;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Published location of the dashboard document.
pub const DEFAULT_FEED_URL: &str =
    "https://signalgrid-ui-2025.s3.amazonaws.com/market-data-historical.json";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_FEED_URL: &str = "SIGNALGRID_FEED_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SIGNALGRID_REQUEST_TIMEOUT_SECS";
pub const ENV_TICK_MS: &str = "SIGNALGRID_TICK_MS";
pub const ENV_WINDOW_HOURS: &str = "SIGNALGRID_WINDOW_HOURS";

/// Configuration for fetching and replaying a timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineConfig {
    /// Dashboard document URL
    pub feed_url: String,
    /// Upper bound on the whole feed request
    pub request_timeout: Duration,
    /// Playback cadence
    pub tick_interval: Duration,
    /// Span of recent history presented by the window
    pub window_span: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            window_span: DEFAULT_WINDOW_SPAN.to_std().unwrap_or_default(),
        }
    }
}

impl TimelineConfig {
    /// Create a new configuration with custom feed URL
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            ..Default::default()
        }
    }

    /// Configuration from `SIGNALGRID_*` environment variables, defaults for anything unset.
    ///
    /// Malformed or zero values are logged and replaced by their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup, see [`TimelineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let feed_url = lookup(ENV_FEED_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.feed_url);

        let request_timeout = positive(&lookup, ENV_REQUEST_TIMEOUT_SECS)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let tick_interval = positive(&lookup, ENV_TICK_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let window_span = positive(&lookup, ENV_WINDOW_HOURS)
            .and_then(|hours| hours.checked_mul(60 * 60))
            .map(Duration::from_secs)
            .unwrap_or(defaults.window_span);

        Self {
            feed_url,
            request_timeout,
            tick_interval,
            window_span,
        }
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set playback tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set window span
    pub fn with_window_span(mut self, span: Duration) -> Self {
        self.window_span = span;
        self
    }

    /// Parse and validate the feed URL. Only `http` and `https` are accepted.
    pub fn feed_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: self.feed_url.clone(),
            reason,
        };

        let url = Url::parse(&self.feed_url).map_err(|error| invalid(error.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(invalid(format!("unsupported scheme {scheme:?}"))),
        }
    }

    /// Window span as a signed [`TimeDelta`], saturating at the maximum representable span.
    pub fn window_span_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.window_span).unwrap_or(TimeDelta::MAX)
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = %raw, "ignoring invalid configuration value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        assert_eq!(TimelineConfig::from_lookup(lookup(&[])), TimelineConfig::default());
    }

    #[test]
    fn test_from_lookup() {
        struct TestCase {
            vars: Vec<(&'static str, &'static str)>,
            expected: TimelineConfig,
        }

        let tests = vec![
            TestCase {
                // TC0: every variable set
                vars: vec![
                    (ENV_FEED_URL, "http://localhost:8080/feed.json"),
                    (ENV_REQUEST_TIMEOUT_SECS, "3"),
                    (ENV_TICK_MS, "250"),
                    (ENV_WINDOW_HOURS, "6"),
                ],
                expected: TimelineConfig::new("http://localhost:8080/feed.json")
                    .with_request_timeout(Duration::from_secs(3))
                    .with_tick_interval(Duration::from_millis(250))
                    .with_window_span(Duration::from_secs(6 * 3600)),
            },
            TestCase {
                // TC1: malformed and zero values fall back to defaults
                vars: vec![
                    (ENV_REQUEST_TIMEOUT_SECS, "ten"),
                    (ENV_TICK_MS, "0"),
                    (ENV_WINDOW_HOURS, "-4"),
                ],
                expected: TimelineConfig::default(),
            },
            TestCase {
                // TC2: blank url falls back to default
                vars: vec![(ENV_FEED_URL, "  "), (ENV_TICK_MS, " 900 ")],
                expected: TimelineConfig::default()
                    .with_tick_interval(Duration::from_millis(900)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = TimelineConfig::from_lookup(lookup(&test.vars));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_feed_url() {
        let url = TimelineConfig::default().feed_url().unwrap();
        assert_eq!(url.host_str(), Some("signalgrid-ui-2025.s3.amazonaws.com"));

        assert!(matches!(
            TimelineConfig::new("not a url").feed_url(),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            TimelineConfig::new("ftp://example.com/feed.json").feed_url(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_window_span_delta() {
        assert_eq!(
            TimelineConfig::default().window_span_delta(),
            TimeDelta::hours(24)
        );
    }
}
