//! Record normalisation: loosely typed feed records into canonical [`Entity`]s.
//!
//! The feed mixes JSON numbers and numeric text for the same field, and older records omit
//! fields entirely. [`RawStockRecord`] accepts exactly those shapes and nothing else; every
//! numeric value is then parsed into a [`Decimal`], with deterministic fallbacks for absent
//! fields.

use crate::{
    error::RecordError,
    types::{CrossSignal, Entity, Status, Ticker},
};
use fnv::FnvHasher;
use indexmap::IndexMap;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{hash::Hasher, str::FromStr};
use tracing::{debug, info, warn};

/// Number of closes kept in [`Entity::price_history`].
pub const PRICE_HISTORY_LEN: usize = 30;

/// Neutral RSI used when a record carries none.
pub const DEFAULT_RSI: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

pub const UNKNOWN_SECTOR: &str = "Unknown";
pub const UNKNOWN_SIGNAL_DATE: &str = "Unknown";

/// Identifiers synthesised into the highest market cap tier.
const MEGA_CAP_TICKERS: &[&str] = &["AAPL", "MSFT", "NVDA", "GOOGL", "GOOG", "AMZN", "META"];

/// Identifiers synthesised into the secondary large cap tier.
const LARGE_CAP_TICKERS: &[&str] = &[
    "BRK.B", "BRK-B", "AVGO", "LLY", "TSLA", "JPM", "V", "WMT", "UNH", "XOM", "MA", "ORCL",
    "COST",
];

/// A numeric feed value, either a JSON number or numeric text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(serde_json::Number),
    Text(String),
}

impl RawNumber {
    /// Blank and `NaN` text are treated the same as an absent field.
    pub fn is_blank(&self) -> bool {
        matches!(
            self,
            RawNumber::Text(text) if text.trim().is_empty() || text.trim().eq_ignore_ascii_case("nan")
        )
    }

    /// Parse into a [`Decimal`] without passing through `f64`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            RawNumber::Number(number) => parse_decimal(&number.to_string()),
            RawNumber::Text(text) => parse_decimal(text),
        }
    }
}

impl std::fmt::Display for RawNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawNumber::Number(number) => write!(f, "{number}"),
            RawNumber::Text(text) => write!(f, "{text}"),
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .map(|decimal| decimal.normalize())
}

/// ### Raw Payload Example
///```json
/// {
///     "ticker": "AAPL",
///     "company_name": "Apple Inc.",
///     "sector": "Technology",
///     "status": "BULLISH",
///     "signal": "NONE",
///     "current_price": "189.84",
///     "daily_change": -0.42,
///     "volume": "48211000",
///     "rsi": "61.2",
///     "sma_50": "182.10",
///     "sma_200": 176.55,
///     "price_history": ["187.1", 188.02, "189.84"],
///     "strategy_return": "7.51",
///     "signal_date": "41 days ago"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawStockRecord {
    pub ticker: Option<String>,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub status: Option<String>,
    pub signal: Option<String>,
    pub current_price: Option<RawNumber>,
    pub daily_change: Option<RawNumber>,
    pub volume: Option<RawNumber>,
    pub market_cap: Option<RawNumber>,
    pub strategy_return: Option<RawNumber>,
    pub signal_date: Option<String>,
    pub rsi: Option<RawNumber>,
    pub price_history: Option<Vec<RawNumber>>,
    pub sma_50: Option<RawNumber>,
    pub sma_200: Option<RawNumber>,
    pub year_high: Option<RawNumber>,
    pub year_low: Option<RawNumber>,
    pub updated_at: Option<String>,
    pub source: Option<String>,
}

impl RawStockRecord {
    /// Deserialise one record from the feed. Shapes outside the accepted ones are reported as
    /// [`RecordError::Malformed`] instead of being coerced.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        Self::deserialize(value).map_err(|error| RecordError::Malformed(error.to_string()))
    }

    /// Trimmed, non-empty ticker.
    pub fn ticker(&self) -> Result<Ticker, RecordError> {
        self.ticker
            .as_deref()
            .map(str::trim)
            .filter(|ticker| !ticker.is_empty())
            .map(Ticker::from)
            .ok_or(RecordError::MissingIdentifier)
    }
}

/// Field-by-field parsing of a [`RawStockRecord`] on behalf of one ticker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldParser<'a> {
    ticker: &'a Ticker,
}

impl<'a> FieldParser<'a> {
    pub(crate) fn new(ticker: &'a Ticker) -> Self {
        Self { ticker }
    }

    fn invalid(&self, field: &'static str, value: impl ToString) -> RecordError {
        RecordError::InvalidField {
            ticker: self.ticker.clone(),
            field,
            value: value.to_string(),
        }
    }

    pub(crate) fn decimal(
        &self,
        field: &'static str,
        raw: Option<&RawNumber>,
    ) -> Result<Option<Decimal>, RecordError> {
        match raw {
            None => Ok(None),
            Some(raw) if raw.is_blank() => Ok(None),
            Some(raw) => raw
                .to_decimal()
                .map(Some)
                .ok_or_else(|| self.invalid(field, raw)),
        }
    }

    pub(crate) fn status(&self, raw: Option<&str>) -> Result<Option<Status>, RecordError> {
        match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Ok(None),
            Some(raw) => Status::parse(raw)
                .map(Some)
                .ok_or_else(|| self.invalid("status", raw)),
        }
    }

    pub(crate) fn signal(&self, raw: Option<&str>) -> Result<Option<CrossSignal>, RecordError> {
        match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Ok(None),
            Some(raw) => CrossSignal::parse(raw)
                .map(Some)
                .ok_or_else(|| self.invalid("signal", raw)),
        }
    }

    pub(crate) fn rsi(&self, raw: Option<&RawNumber>) -> Result<Option<Decimal>, RecordError> {
        Ok(self
            .decimal("rsi", raw)?
            .map(|rsi| rsi.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)))
    }

    /// Keeps the most recent [`PRICE_HISTORY_LEN`] points.
    pub(crate) fn price_history(
        &self,
        raw: Option<&[RawNumber]>,
    ) -> Result<Option<Vec<Decimal>>, RecordError> {
        let Some(raw) = raw else {
            return Ok(None);
        };

        let start = raw.len().saturating_sub(PRICE_HISTORY_LEN);
        raw[start..]
            .iter()
            .map(|point| point.to_decimal().ok_or_else(|| self.invalid("price_history", point)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Free-text fields are trimmed, blank text counts as absent.
pub(crate) fn text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Normalise one baseline record into a complete [`Entity`].
pub fn normalize_record(raw: &RawStockRecord) -> Result<Entity, RecordError> {
    let ticker = raw.ticker()?;
    let parser = FieldParser::new(&ticker);

    let sma_50 = parser.decimal("sma_50", raw.sma_50.as_ref())?.unwrap_or_default();
    let sma_200 = parser
        .decimal("sma_200", raw.sma_200.as_ref())?
        .unwrap_or_default();
    let status = parser
        .status(raw.status.as_deref())?
        .unwrap_or_else(|| Status::from_moving_averages(sma_50, sma_200));
    let signal = parser.signal(raw.signal.as_deref())?.unwrap_or_default();
    let sector = text(raw.sector.as_deref()).unwrap_or_else(|| UNKNOWN_SECTOR.to_string());

    let market_cap = match parser.decimal("market_cap", raw.market_cap.as_ref())? {
        Some(market_cap) => market_cap,
        None => {
            let market_cap = synthesize_market_cap(&ticker, &sector);
            debug!(%ticker, %sector, %market_cap, "synthesised missing market cap");
            market_cap
        }
    };

    let entity = Entity {
        company_name: text(raw.company_name.as_deref())
            .unwrap_or_else(|| ticker.as_str().to_string()),
        status,
        signal,
        current_price: parser
            .decimal("current_price", raw.current_price.as_ref())?
            .unwrap_or_default(),
        daily_change: parser
            .decimal("daily_change", raw.daily_change.as_ref())?
            .unwrap_or_default(),
        volume: parser.decimal("volume", raw.volume.as_ref())?.unwrap_or_default(),
        market_cap,
        strategy_return: parser
            .decimal("strategy_return", raw.strategy_return.as_ref())?
            .unwrap_or_default(),
        signal_date: text(raw.signal_date.as_deref())
            .unwrap_or_else(|| UNKNOWN_SIGNAL_DATE.to_string()),
        rsi: parser.rsi(raw.rsi.as_ref())?.unwrap_or(DEFAULT_RSI),
        price_history: parser
            .price_history(raw.price_history.as_deref())?
            .unwrap_or_default(),
        sma_50,
        sma_200,
        year_high: parser.decimal("year_high", raw.year_high.as_ref())?,
        year_low: parser.decimal("year_low", raw.year_low.as_ref())?,
        updated_at: text(raw.updated_at.as_deref()),
        source: text(raw.source.as_deref()),
        sector,
        ticker,
    };

    Ok(entity)
}

/// Market cap tier used when a record carries no market cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketCapTier {
    Mega,
    Large,
    Technology,
    Healthcare,
    Other,
}

impl MarketCapTier {
    pub fn classify(ticker: &Ticker, sector: &str) -> Self {
        let sector = sector.trim();
        if MEGA_CAP_TICKERS.contains(&ticker.as_str()) {
            MarketCapTier::Mega
        } else if LARGE_CAP_TICKERS.contains(&ticker.as_str()) {
            MarketCapTier::Large
        } else if sector.eq_ignore_ascii_case("Technology") {
            MarketCapTier::Technology
        } else if sector.eq_ignore_ascii_case("Healthcare")
            || sector.eq_ignore_ascii_case("Health Care")
        {
            MarketCapTier::Healthcare
        } else {
            MarketCapTier::Other
        }
    }

    /// Synthetic range in billions, lower bound inclusive.
    pub fn range(&self) -> (u64, u64) {
        match self {
            MarketCapTier::Mega => (1_500, 3_500),
            MarketCapTier::Large => (400, 900),
            MarketCapTier::Technology => (100, 400),
            MarketCapTier::Healthcare => (80, 300),
            MarketCapTier::Other => (30, 200),
        }
    }
}

/// Synthesise a market cap (billions, 2dp) within the ticker's [`MarketCapTier`].
///
/// The value is drawn from an RNG seeded with a stable FNV hash of ticker and sector, so the same
/// record always normalises to the same entity.
pub fn synthesize_market_cap(ticker: &Ticker, sector: &str) -> Decimal {
    let (low, high) = MarketCapTier::classify(ticker, sector).range();

    let mut hasher = FnvHasher::default();
    hasher.write(ticker.as_str().as_bytes());
    hasher.write_u8(0xff);
    hasher.write(sector.trim().as_bytes());

    let mut rng = StdRng::seed_from_u64(hasher.finish());
    let cents = rng.random_range(low * 100..high * 100);

    Decimal::new(cents as i64, 2).normalize()
}

/// Live baseline entities keyed by ticker, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    entities: IndexMap<Ticker, Entity>,
    rejected: usize,
}

impl Baseline {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of feed records dropped during normalisation.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn get(&self, ticker: &str) -> Option<&Entity> {
        self.entities.get(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ticker, &Entity)> {
        self.entities.iter()
    }

    /// Owned copy of every entity, in feed order.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }
}

impl FromIterator<Entity> for Baseline {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        Self {
            entities: iter
                .into_iter()
                .map(|entity| (entity.ticker.clone(), entity))
                .collect(),
            rejected: 0,
        }
    }
}

/// Normalise every baseline record, dropping (and logging) the ones that fail.
///
/// A ticker appearing twice keeps its position but takes the later record's values.
pub fn normalize_baseline(records: &[Value]) -> Baseline {
    let mut baseline = Baseline::default();

    for (index, value) in records.iter().enumerate() {
        match RawStockRecord::from_value(value).and_then(|raw| normalize_record(&raw)) {
            Ok(entity) => {
                if let Some(previous) = baseline.entities.insert(entity.ticker.clone(), entity) {
                    debug!(ticker = %previous.ticker, "duplicate baseline record replaced");
                }
            }
            Err(error) => {
                warn!(index, %error, "dropping baseline record");
                baseline.rejected += 1;
            }
        }
    }

    info!(
        accepted = baseline.len(),
        rejected = baseline.rejected,
        "Normalised baseline records"
    );

    baseline
}
