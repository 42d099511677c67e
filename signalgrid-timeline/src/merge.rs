//! Snapshot merging: partial historical records over the live [`Baseline`].

use crate::{
    error::RecordError,
    normalize::{Baseline, FieldParser, RawStockRecord, text},
    types::{Entity, Snapshot, Ticker, truncate_to_millis},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One entry of the feed's `historicalSnapshots` array.
///
/// ### Raw Payload Example
///```json
/// {
///     "timestamp": "2025-01-14T09:00:03.512993",
///     "stocks": [
///         { "ticker": "AAPL", "status": "BEARISH", "signal": "DEATH_CROSS", "sma_50": "181.02", "sma_200": "181.40" }
///     ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawHistoricalGroup {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub stocks: Vec<Value>,
}

impl RawHistoricalGroup {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        Self::deserialize(value).map_err(|error| RecordError::Malformed(error.to_string()))
    }
}

/// Parse a group timestamp.
///
/// Accepts epoch milliseconds (JSON number or numeric text), RFC 3339 text, and naive ISO-8601
/// text which is read as UTC. Returns `None` for anything else so the group can be dropped.
pub fn parse_group_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|millis| millis.is_finite())
                    .map(|millis| millis.round() as i64)
            })
            .and_then(DateTime::from_timestamp_millis),
        Value::String(text) => parse_timestamp_text(text),
        _ => None,
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(millis) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Merge one partial record over its baseline entity.
///
/// Every field present on the partial record overrides the baseline; moving averages are always
/// re-parsed into canonical decimal form. A record with no baseline match is
/// [`RecordError::Unmatched`], no entity is invented for historical-only tickers.
pub fn merge_record(baseline: &Baseline, raw: &RawStockRecord) -> Result<Entity, RecordError> {
    let ticker = raw.ticker()?;
    let base = baseline
        .get(ticker.as_str())
        .ok_or_else(|| RecordError::Unmatched(ticker.clone()))?;

    let parser = FieldParser::new(&ticker);
    let mut merged = base.clone();

    if let Some(sma_50) = parser.decimal("sma_50", raw.sma_50.as_ref())? {
        merged.sma_50 = sma_50;
    }
    if let Some(sma_200) = parser.decimal("sma_200", raw.sma_200.as_ref())? {
        merged.sma_200 = sma_200;
    }
    if let Some(status) = parser.status(raw.status.as_deref())? {
        merged.status = status;
    }
    if let Some(signal) = parser.signal(raw.signal.as_deref())? {
        merged.signal = signal;
    }
    if let Some(market_cap) = parser.decimal("market_cap", raw.market_cap.as_ref())? {
        merged.market_cap = market_cap;
    }
    if let Some(current_price) = parser.decimal("current_price", raw.current_price.as_ref())? {
        merged.current_price = current_price;
    }
    if let Some(daily_change) = parser.decimal("daily_change", raw.daily_change.as_ref())? {
        merged.daily_change = daily_change;
    }
    if let Some(volume) = parser.decimal("volume", raw.volume.as_ref())? {
        merged.volume = volume;
    }
    if let Some(strategy_return) =
        parser.decimal("strategy_return", raw.strategy_return.as_ref())?
    {
        merged.strategy_return = strategy_return;
    }
    if let Some(rsi) = parser.rsi(raw.rsi.as_ref())? {
        merged.rsi = rsi;
    }
    if let Some(price_history) = parser.price_history(raw.price_history.as_deref())? {
        merged.price_history = price_history;
    }
    if let Some(year_high) = parser.decimal("year_high", raw.year_high.as_ref())? {
        merged.year_high = Some(year_high);
    }
    if let Some(year_low) = parser.decimal("year_low", raw.year_low.as_ref())? {
        merged.year_low = Some(year_low);
    }
    if let Some(sector) = text(raw.sector.as_deref()) {
        merged.sector = sector;
    }
    if let Some(company_name) = text(raw.company_name.as_deref()) {
        merged.company_name = company_name;
    }
    if let Some(signal_date) = text(raw.signal_date.as_deref()) {
        merged.signal_date = signal_date;
    }
    if let Some(updated_at) = text(raw.updated_at.as_deref()) {
        merged.updated_at = Some(updated_at);
    }
    if let Some(source) = text(raw.source.as_deref()) {
        merged.source = Some(source);
    }

    Ok(merged)
}

/// Merge every historical group into a [`Snapshot`], ordered by timestamp.
///
/// Groups sharing a timestamp are combined. Groups with an unparseable timestamp, and groups in
/// which no record matched the baseline, are dropped. Each snapshot carries the full baseline
/// identifier set in baseline order: merged entities where a record matched, baseline entities
/// otherwise.
pub fn merge_history(baseline: &Baseline, groups: &[RawHistoricalGroup]) -> Vec<Snapshot> {
    let mut merged_by_time: BTreeMap<DateTime<Utc>, IndexMap<Ticker, Entity>> = BTreeMap::new();
    let mut invalid_groups = 0usize;
    let mut unmatched = 0usize;

    for group in groups {
        let Some(timestamp) = group.timestamp.as_ref().and_then(parse_group_timestamp) else {
            warn!(
                timestamp = ?group.timestamp,
                records = group.stocks.len(),
                "dropping historical group with unparseable timestamp"
            );
            invalid_groups += 1;
            continue;
        };

        let merged = merged_by_time
            .entry(truncate_to_millis(timestamp))
            .or_default();

        for value in &group.stocks {
            match RawStockRecord::from_value(value).and_then(|raw| merge_record(baseline, &raw)) {
                Ok(entity) => {
                    merged.insert(entity.ticker.clone(), entity);
                }
                Err(RecordError::Unmatched(ticker)) => {
                    debug!(%ticker, %timestamp, "historical record has no baseline match");
                    unmatched += 1;
                }
                Err(error) => {
                    warn!(%timestamp, %error, "dropping historical record");
                }
            }
        }
    }

    let snapshots: Vec<Snapshot> = merged_by_time
        .into_iter()
        .filter_map(|(timestamp, mut merged)| {
            if merged.is_empty() {
                debug!(%timestamp, "dropping historical group with no baseline matches");
                return None;
            }

            let entities = baseline
                .iter()
                .map(|(ticker, base)| {
                    merged
                        .swap_remove(ticker.as_str())
                        .unwrap_or_else(|| base.clone())
                })
                .collect();

            Some(Snapshot::historical(timestamp, entities))
        })
        .collect();

    info!(
        groups = groups.len(),
        snapshots = snapshots.len(),
        invalid_groups,
        unmatched,
        "Merged historical snapshots"
    );

    snapshots
}
