//! The [`TimelineSession`], the outbound surface over a fetched timeline.

use crate::{
    config::TimelineConfig,
    error::TimelineError,
    history::HistoryStore,
    metrics::{Sentiment, sentiment},
    playback::{PlaybackController, PlaybackState},
    types::{Entity, Snapshot},
    window::HistoryWindow,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::info;

/// The outbound surface of a timeline: a shared [`HistoryStore`], the [`PlaybackController`]
/// positioned over it and the window span used for recent-history views.
///
/// Dropping the session drops the controller and with it any running playback clock.
#[derive(Debug)]
pub struct TimelineSession {
    history: Arc<HistoryStore>,
    playback: PlaybackController,
    window_span: TimeDelta,
}

impl TimelineSession {
    /// Start a session resting on the newest snapshot.
    pub fn new(history: impl Into<Arc<HistoryStore>>, config: &TimelineConfig) -> Self {
        let history = history.into();
        Self {
            playback: PlaybackController::new(history.len(), config.tick_interval),
            window_span: config.window_span_delta(),
            history,
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn position(&self) -> usize {
        self.playback.position()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.history.get(self.playback.position())
    }

    /// Entities at the playback position, empty when there is no data.
    pub fn current_entities(&self) -> &[Entity] {
        self.current_snapshot()
            .map(Snapshot::entities)
            .unwrap_or_default()
    }

    /// Label at the playback position, empty when there is no data.
    pub fn label(&self) -> &str {
        self.current_snapshot()
            .map(Snapshot::label)
            .unwrap_or_default()
    }

    /// True when the playback position is anywhere but the newest snapshot.
    pub fn is_historical(&self) -> bool {
        self.history
            .newest_index()
            .is_some_and(|newest| self.playback.position() != newest)
    }

    pub fn sentiment(&self) -> Sentiment {
        sentiment(self.current_entities())
    }

    /// Recent-history view evaluated against the current wall-clock time.
    pub fn window(&self) -> HistoryWindow<'_> {
        self.window_at(Utc::now())
    }

    pub fn window_at(&self, now: DateTime<Utc>) -> HistoryWindow<'_> {
        HistoryWindow::evaluate(&self.history, now, self.window_span)
    }

    /// Playback position expressed as a position within the window at `now`.
    pub fn window_position(&self, now: DateTime<Utc>) -> Option<usize> {
        self.window_at(now).to_window_index(self.playback.position())
    }

    pub fn set_position(&mut self, index: usize) -> Result<(), TimelineError> {
        self.playback.set_position(index)
    }

    /// Move to a window position at `now`, stopping playback.
    ///
    /// As with [`TimelineSession::set_position`], an out of range `window_index` panics in debug
    /// builds and is [`TimelineError::IndexOutOfRange`] in release builds.
    pub fn set_window_position(
        &mut self,
        window_index: usize,
        now: DateTime<Utc>,
    ) -> Result<(), TimelineError> {
        let full_index = {
            let window = self.window_at(now);
            debug_assert!(
                window_index < window.len(),
                "window position {window_index} out of range for window of length {}",
                window.len()
            );

            window
                .get(window_index)
                .and_then(|_| window.to_full_index(window_index))
                .ok_or(TimelineError::IndexOutOfRange {
                    index: window_index,
                    len: window.len(),
                })?
        };
        self.playback.set_position(full_index)
    }

    pub fn play(&mut self) {
        self.playback.play()
    }

    pub fn stop(&mut self) {
        self.playback.stop()
    }

    /// Wait for and apply the next playback tick, see [`PlaybackController::next_tick`].
    pub async fn next_tick(&mut self) -> Option<usize> {
        self.playback.next_tick().await
    }

    /// Replace the history wholesale, stopping playback and resting on the newest snapshot.
    pub fn reload(&mut self, history: impl Into<Arc<HistoryStore>>) {
        self.history = history.into();
        self.playback.reset(self.history.len());
        info!(snapshots = self.history.len(), "Timeline reloaded");
    }
}
