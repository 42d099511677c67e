//! The immutable, timestamp-ordered History Store.

use crate::{
    error::TimelineError,
    normalize::Baseline,
    types::{Snapshot, SnapshotKind},
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Ordered sequence of [`Snapshot`]s, strictly ascending by timestamp.
///
/// Built once per fetch and never mutated afterwards; a new fetch replaces the whole store. An
/// empty store is a valid terminal "no data" state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStore {
    snapshots: Vec<Snapshot>,
}

impl HistoryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from merged historical snapshots plus a live snapshot of the `baseline`
    /// stamped `fetched_at`.
    ///
    /// The full sequence is sorted by timestamp; the store never assumes the live snapshot lands
    /// last. A historical snapshot sharing the live timestamp is dropped, as are later duplicates
    /// of any timestamp, so every timestamp is unique.
    pub fn build(
        baseline: &Baseline,
        historical: Vec<Snapshot>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let live = Snapshot::live(fetched_at, baseline.entities());

        let mut snapshots: Vec<Snapshot> = historical
            .into_iter()
            .filter(|snapshot| {
                if snapshot.timestamp() == live.timestamp() {
                    warn!(
                        timestamp = %snapshot.timestamp(),
                        "dropping historical snapshot sharing the live timestamp"
                    );
                    return false;
                }
                true
            })
            .collect();
        snapshots.push(live);

        snapshots.sort_by_key(Snapshot::timestamp);
        snapshots.dedup_by_key(|snapshot| snapshot.timestamp());

        if snapshots.last().is_some_and(|newest| !newest.is_live()) {
            warn!("historical snapshot is newer than the live baseline, live is not the newest entry");
        }

        let store = Self { snapshots };
        info!(
            snapshots = store.len(),
            entities = baseline.len(),
            oldest = ?store.first().map(Snapshot::timestamp),
            newest = ?store.last().map(Snapshot::timestamp),
            "Built history store"
        );

        store
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Snapshot at `index`, or [`TimelineError::IndexOutOfRange`] outside `[0, len-1]`.
    pub fn at(&self, index: usize) -> Result<&Snapshot, TimelineError> {
        self.snapshots
            .get(index)
            .ok_or(TimelineError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub fn first(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Index of the newest snapshot, `None` for an empty store.
    pub fn newest_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    /// Index of the snapshot with exactly this timestamp.
    pub fn position_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.snapshots
            .binary_search_by_key(&timestamp, Snapshot::timestamp)
            .ok()
    }

    /// The snapshot built from the live baseline.
    pub fn live(&self) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.kind() == SnapshotKind::Live)
    }
}

impl<'a> IntoIterator for &'a HistoryStore {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
