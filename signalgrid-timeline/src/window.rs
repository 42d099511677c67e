//! Recent-history view over a [`HistoryStore`](crate::history::HistoryStore).

use crate::{history::HistoryStore, types::Snapshot};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

/// Default span of recent history presented by a [`HistoryWindow`].
pub const DEFAULT_WINDOW_SPAN: TimeDelta = TimeDelta::hours(24);

/// Recent subsequence of a [`HistoryStore`], `now - span <= timestamp <= now`.
///
/// The window depends on wall-clock `now`, so it is evaluated on every access and borrowed from
/// the store rather than cached. The store remains the single source of truth: window positions
/// are translated to and from store positions by timestamp identity.
///
/// If no snapshot falls within the span the window fails open and presents the full store.
#[derive(Debug, Clone)]
pub struct HistoryWindow<'a> {
    store: &'a HistoryStore,
    visible: Vec<&'a Snapshot>,
    fallback: bool,
}

impl<'a> HistoryWindow<'a> {
    pub fn evaluate(store: &'a HistoryStore, now: DateTime<Utc>, span: TimeDelta) -> Self {
        let start = now
            .checked_sub_signed(span)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let visible: Vec<&Snapshot> = store
            .iter()
            .filter(|snapshot| (start..=now).contains(&snapshot.timestamp()))
            .collect();

        if visible.is_empty() && !store.is_empty() {
            debug!(
                %start,
                %now,
                snapshots = store.len(),
                "no snapshots within window, presenting full history"
            );
            return Self {
                store,
                visible: store.iter().collect(),
                fallback: true,
            };
        }

        Self {
            store,
            visible,
            fallback: false,
        }
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// True when nothing fell within the span and the full store is presented instead.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn snapshots(&self) -> &[&'a Snapshot] {
        &self.visible
    }

    pub fn get(&self, index: usize) -> Option<&'a Snapshot> {
        self.visible.get(index).copied()
    }

    fn newest_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    /// Translate a store position into a window position.
    ///
    /// Positions outside the window (or outside the store) collapse to the newest visible
    /// snapshot. `None` only when the store is empty.
    pub fn to_window_index(&self, full_index: usize) -> Option<usize> {
        self.store
            .get(full_index)
            .and_then(|target| {
                self.visible
                    .binary_search_by_key(&target.timestamp(), |snapshot| snapshot.timestamp())
                    .ok()
            })
            .or_else(|| self.newest_index())
    }

    /// Translate a window position into a store position, falling back to the newest store
    /// position if the window snapshot cannot be located. `None` only when the store is empty.
    pub fn to_full_index(&self, window_index: usize) -> Option<usize> {
        self.get(window_index)
            .and_then(|snapshot| self.store.position_of(snapshot.timestamp()))
            .or_else(|| self.store.newest_index())
    }
}
