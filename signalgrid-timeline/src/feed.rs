//! One-shot retrieval of the dashboard document and its assembly into a [`HistoryStore`].

use crate::{
    config::TimelineConfig,
    error::{ConfigError, FetchError},
    history::HistoryStore,
    merge::{RawHistoricalGroup, merge_history, parse_group_timestamp},
    normalize::normalize_baseline,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// The dashboard document.
///
/// ### Raw Payload Example
///```json
/// {
///     "stockData": [
///         { "ticker": "AAPL", "company_name": "Apple Inc.", "sector": "Technology", "status": "BULLISH", "current_price": "227.48", "sma_50": "221.03", "sma_200": "204.11" }
///     ],
///     "historicalSnapshots": [
///         { "timestamp": 1736845200000, "stocks": [ { "ticker": "AAPL", "status": "BEARISH" } ] }
///     ],
///     "retrieved_at": "2025-01-14T21:00:04.118201"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPayload {
    pub stock_data: Vec<Value>,
    #[serde(default)]
    pub historical_snapshots: Vec<Value>,
    #[serde(default, rename = "retrieved_at")]
    pub retrieved_at: Option<Value>,
}

impl FeedPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(bytes).map_err(FetchError::from)
    }

    /// When the upstream aggregator produced the document, if stated and parseable.
    pub fn retrieved_at(&self) -> Option<DateTime<Utc>> {
        self.retrieved_at.as_ref().and_then(parse_group_timestamp)
    }

    /// Normalise, merge and sort the document into a [`HistoryStore`] whose live snapshot is
    /// stamped `fetched_at`.
    pub fn into_history(self, fetched_at: DateTime<Utc>) -> HistoryStore {
        if let Some(retrieved_at) = self.retrieved_at() {
            let age = fetched_at.signed_duration_since(retrieved_at);
            info!(%retrieved_at, age_secs = age.num_seconds(), "Feed document retrieved upstream");
        }

        let baseline = normalize_baseline(&self.stock_data);

        let groups: Vec<RawHistoricalGroup> = self
            .historical_snapshots
            .iter()
            .enumerate()
            .filter_map(|(index, value)| match RawHistoricalGroup::from_value(value) {
                Ok(group) => Some(group),
                Err(error) => {
                    warn!(index, %error, "dropping malformed historical group");
                    None
                }
            })
            .collect();

        let historical = merge_history(&baseline, &groups);
        HistoryStore::build(&baseline, historical, fetched_at)
    }
}

/// Build a [`HistoryStore`] from raw document bytes.
///
/// An unparseable document is logged and yields an empty store.
pub fn history_from_slice(bytes: &[u8], fetched_at: DateTime<Utc>) -> HistoryStore {
    match FeedPayload::from_slice(bytes) {
        Ok(payload) => payload.into_history(fetched_at),
        Err(error) => {
            error!(%error, bytes = bytes.len(), "failed to parse feed document");
            HistoryStore::empty()
        }
    }
}

/// HTTP client for the dashboard document.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(config: &TimelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: config.feed_url()?,
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch and decode the document, surfacing the cause of any failure.
    pub async fn fetch_payload(&self) -> Result<FeedPayload, FetchError> {
        debug!(url = %self.url, timeout = ?self.timeout, "Fetching feed document");

        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Received feed document");

        FeedPayload::from_slice(&bytes)
    }

    /// Fetch the document and build a [`HistoryStore`] stamped with the current time.
    ///
    /// Never fails: any [`FetchError`] is logged and yields an empty store, which callers treat
    /// as "no data" rather than something to retry.
    pub async fn fetch_history(&self) -> HistoryStore {
        match self.fetch_payload().await {
            Ok(payload) => payload.into_history(Utc::now()),
            Err(error) => {
                error!(
                    url = %self.url,
                    %error,
                    transient = error.is_transient(),
                    "failed to fetch feed document"
                );
                HistoryStore::empty()
            }
        }
    }
}
