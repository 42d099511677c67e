//! Aggregate statistics over an [`Entity`](crate::types::Entity) set.

use crate::types::{CrossSignal, Entity, Snapshot, Status, Ticker};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Bullish versus bearish breakdown of an [`Entity`] set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Constructor,
)]
pub struct Sentiment {
    pub bullish: usize,
    pub bearish: usize,
    /// Bullish share of the set, rounded to the nearest whole percent (halves round up).
    pub percent: u8,
}

/// Compute the [`Sentiment`] of an [`Entity`] set. An empty set is `{0, 0, 0}`.
pub fn sentiment(entities: &[Entity]) -> Sentiment {
    let total = entities.len();
    let bullish = entities
        .iter()
        .filter(|entity| entity.status.is_bullish())
        .count();

    Sentiment {
        bullish,
        bearish: total - bullish,
        percent: rounded_percent(bullish, total),
    }
}

fn rounded_percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // round(part / total * 100) in integer arithmetic
    let percent = (part * 200 + total) / (2 * total);
    u8::try_from(percent).unwrap_or(100)
}

/// Count of each [`CrossSignal`] across an [`Entity`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub struct SignalCounts {
    pub golden_cross: usize,
    pub death_cross: usize,
    pub none: usize,
}

pub fn signal_counts(entities: &[Entity]) -> SignalCounts {
    entities
        .iter()
        .fold(SignalCounts::default(), |mut counts, entity| {
            match entity.signal {
                CrossSignal::GoldenCross => counts.golden_cross += 1,
                CrossSignal::DeathCross => counts.death_cross += 1,
                CrossSignal::NoCross => counts.none += 1,
            }
            counts
        })
}

/// An instrument whose [`Status`] changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Constructor)]
pub struct StatusFlip {
    pub ticker: Ticker,
    pub from: Status,
    pub to: Status,
}

/// Instruments present in both snapshots whose status differs, in `to` order.
pub fn status_flips(from: &Snapshot, to: &Snapshot) -> Vec<StatusFlip> {
    to.entities()
        .iter()
        .filter_map(|current| {
            let previous = from.entity(current.ticker.as_str())?;
            (previous.status != current.status).then(|| {
                StatusFlip::new(current.ticker.clone(), previous.status, current.status)
            })
        })
        .collect()
}
