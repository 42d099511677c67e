//! Core data types shared by every stage of the timeline.

use chrono::{DateTime, Local, Utc};
use derive_more::{Display, From};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;

/// Label carried by the snapshot built from the live baseline.
pub const LIVE_LABEL: &str = "LIVE";

/// Unique identifier of a tradable instrument (eg/ "AAPL", "BRK.B").
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Display, From,
)]
pub struct Ticker(SmolStr);

impl Ticker {
    pub fn new(ticker: impl Into<SmolStr>) -> Self {
        Self(ticker.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Ticker {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// Directional status of an instrument, derived from its moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Status {
    #[serde(rename = "BULLISH")]
    Bullish,
    #[serde(rename = "BEARISH")]
    Bearish,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Bullish => "BULLISH",
            Status::Bearish => "BEARISH",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Status::Bullish)
    }

    /// Parse a feed status tag, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("BULLISH") {
            Some(Status::Bullish)
        } else if raw.eq_ignore_ascii_case("BEARISH") {
            Some(Status::Bearish)
        } else {
            None
        }
    }

    /// Short average above long average is bullish, anything else bearish.
    pub fn from_moving_averages(sma_50: Decimal, sma_200: Decimal) -> Self {
        if sma_50 > sma_200 {
            Status::Bullish
        } else {
            Status::Bearish
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moving-average crossover observed on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum CrossSignal {
    #[serde(rename = "GOLDEN_CROSS")]
    GoldenCross,
    #[serde(rename = "DEATH_CROSS")]
    DeathCross,
    #[default]
    #[serde(rename = "NONE")]
    NoCross,
}

impl CrossSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossSignal::GoldenCross => "GOLDEN_CROSS",
            CrossSignal::DeathCross => "DEATH_CROSS",
            CrossSignal::NoCross => "NONE",
        }
    }

    /// Parse a feed signal tag, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        [
            CrossSignal::GoldenCross,
            CrossSignal::DeathCross,
            CrossSignal::NoCross,
        ]
        .into_iter()
        .find(|signal| raw.eq_ignore_ascii_case(signal.as_str()))
    }
}

impl std::fmt::Display for CrossSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tradable instrument's complete attribute set at a point in time.
///
/// Numeric fields are [`Decimal`] and serialise as decimal text, so values survive any number of
/// round trips without floating point drift.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Entity {
    pub ticker: Ticker,
    pub company_name: String,
    pub sector: String,
    pub status: Status,
    pub signal: CrossSignal,
    pub current_price: Decimal,
    /// Percent change versus the previous close.
    pub daily_change: Decimal,
    pub volume: Decimal,
    /// Market capitalisation in billions.
    pub market_cap: Decimal,
    /// Percent return since the current trend began.
    pub strategy_return: Decimal,
    pub signal_date: String,
    /// Relative strength index, always within `0..=100`.
    pub rsi: Decimal,
    /// Most recent closes, oldest first.
    pub price_history: Vec<Decimal>,
    pub sma_50: Decimal,
    pub sma_200: Decimal,
    pub year_high: Option<Decimal>,
    pub year_low: Option<Decimal>,
    pub updated_at: Option<String>,
    pub source: Option<String>,
}

/// Whether a [`Snapshot`] was built from the live baseline or a historical delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SnapshotKind {
    Live,
    Historical,
}

/// A timestamped, complete set of [`Entity`]s.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    label: String,
    timestamp: DateTime<Utc>,
    kind: SnapshotKind,
    entities: Vec<Entity>,
}

impl Snapshot {
    /// Construct the live snapshot. Its label is always [`LIVE_LABEL`].
    pub fn live(timestamp: DateTime<Utc>, entities: Vec<Entity>) -> Self {
        Self {
            label: LIVE_LABEL.to_string(),
            timestamp: truncate_to_millis(timestamp),
            kind: SnapshotKind::Live,
            entities,
        }
    }

    /// Construct a historical snapshot labelled with its local `HH:MM`.
    pub fn historical(timestamp: DateTime<Utc>, entities: Vec<Entity>) -> Self {
        let timestamp = truncate_to_millis(timestamp);
        Self {
            label: timestamp.with_timezone(&Local).format("%H:%M").to_string(),
            timestamp,
            kind: SnapshotKind::Historical,
            entities,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.kind == SnapshotKind::Live
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, ticker: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.ticker.as_str() == ticker)
    }
}

/// Timestamps are compared at millisecond resolution, the resolution of the feed.
pub(crate) fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_parse() {
        struct TestCase {
            input: &'static str,
            expected: Option<Status>,
        }

        let tests = vec![
            TestCase {
                // TC0: canonical bullish tag
                input: "BULLISH",
                expected: Some(Status::Bullish),
            },
            TestCase {
                // TC1: lowercase with whitespace
                input: "  bearish ",
                expected: Some(Status::Bearish),
            },
            TestCase {
                // TC2: unknown tag
                input: "NEUTRAL",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(Status::parse(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_status_from_moving_averages() {
        assert_eq!(
            Status::from_moving_averages(dec!(101.5), dec!(100)),
            Status::Bullish
        );
        assert_eq!(
            Status::from_moving_averages(dec!(100), dec!(100)),
            Status::Bearish
        );
    }

    #[test]
    fn test_cross_signal_parse() {
        assert_eq!(CrossSignal::parse("golden_cross"), Some(CrossSignal::GoldenCross));
        assert_eq!(CrossSignal::parse("DEATH_CROSS"), Some(CrossSignal::DeathCross));
        assert_eq!(CrossSignal::parse("None"), Some(CrossSignal::NoCross));
        assert_eq!(CrossSignal::parse("CROSS"), None);
        assert_eq!(CrossSignal::default(), CrossSignal::NoCross);
    }

    #[test]
    fn test_snapshot_timestamp_truncated_to_millis() {
        let timestamp = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let snapshot = Snapshot::historical(timestamp, vec![]);

        assert_eq!(snapshot.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(snapshot.timestamp().timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(snapshot.kind(), SnapshotKind::Historical);
    }

    #[test]
    fn test_snapshot_labels() {
        let timestamp = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let live = Snapshot::live(timestamp, vec![]);
        assert_eq!(live.label(), LIVE_LABEL);
        assert!(live.is_live());

        let historical = Snapshot::historical(timestamp, vec![]);
        let label = historical.label();
        assert_eq!(label.len(), 5);
        assert_eq!(&label[2..3], ":");
        assert!(!historical.is_live());
    }

    #[test]
    fn test_ticker_serialises_as_plain_string() {
        let ticker = Ticker::from("BRK.B");
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"BRK.B\"");
        assert_eq!(ticker.to_string(), "BRK.B");
    }
}
