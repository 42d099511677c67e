//! Timer-driven playback over a [`HistoryStore`](crate::history::HistoryStore).
//!
//! The [`PlaybackController`] owns the playback position and, while playing, a [`PlaybackClock`]
//! task that emits ticks. Every transition out of [`PlaybackState::Playing`] drops the clock
//! before returning, so no tick can be applied after a stop.

use crate::error::TimelineError;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

/// Default playback cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1500);

/// Floor applied to the configured cadence, `tokio::time::interval` rejects a zero period.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    /// Playback reached the newest snapshot. Halted like [`PlaybackState::Stopped`] until the next
    /// `play()`.
    AtEnd,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::AtEnd => "at_end",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spawned task sending the tick [`Instant`] every `period`.
///
/// Dropping the clock signals shutdown, aborts the task and drops the tick receiver, discarding
/// any tick already queued.
#[derive(Debug)]
struct PlaybackClock {
    ticks: mpsc::Receiver<Instant>,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PlaybackClock {
    fn start(period: Duration) -> Self {
        let period = period.max(MIN_TICK_INTERVAL);
        let (tick_tx, ticks) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            // First tick one period from now, not immediately
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    instant = interval.tick() => {
                        if tick_tx.send(instant).await.is_err() {
                            debug!("Playback tick receiver dropped, clock stopping");
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Playback clock shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            ticks,
            shutdown_tx,
            handle,
        }
    }

    async fn tick(&mut self) -> Option<Instant> {
        self.ticks.recv().await
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        self.handle.abort();
    }
}

/// Three-state playback machine over a history of `len` snapshots.
///
/// Position `0` is the oldest snapshot and `len - 1` the newest. A new controller rests on the
/// newest snapshot in [`PlaybackState::Stopped`].
#[derive(Debug)]
pub struct PlaybackController {
    tick_interval: Duration,
    len: usize,
    position: usize,
    state: PlaybackState,
    clock: Option<PlaybackClock>,
}

impl PlaybackController {
    pub fn new(len: usize, tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            len,
            position: len.saturating_sub(1),
            state: PlaybackState::Stopped,
            clock: None,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// True while a clock task is owned.
    pub fn is_running(&self) -> bool {
        self.clock.is_some()
    }

    fn is_newest(&self) -> bool {
        self.position + 1 >= self.len
    }

    /// Start playback. Must be called within a tokio runtime.
    ///
    /// Playing from the newest snapshot rewinds to the oldest first. Histories of a single
    /// snapshot have nowhere to go and land directly in [`PlaybackState::AtEnd`]; an empty
    /// history stays [`PlaybackState::Stopped`].
    pub fn play(&mut self) {
        match (self.state, self.len) {
            (PlaybackState::Playing, _) => return,
            (_, 0) => return self.halt(PlaybackState::Stopped),
            (_, 1) => return self.halt(PlaybackState::AtEnd),
            _ => {}
        }

        if tokio::runtime::Handle::try_current().is_err() {
            error!("playback requires a tokio runtime, staying stopped");
            return;
        }

        if self.is_newest() {
            self.position = 0;
        }

        self.clock = Some(PlaybackClock::start(self.tick_interval));
        self.state = PlaybackState::Playing;
        info!(
            position = self.position,
            len = self.len,
            tick_interval = ?self.tick_interval,
            "Playback started"
        );
    }

    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            info!(position = self.position, "Playback stopped");
        }
        self.halt(PlaybackState::Stopped);
    }

    /// Move to `index`, always stopping playback.
    ///
    /// An out of range `index` is a caller bug: debug builds panic, release builds return
    /// [`TimelineError::IndexOutOfRange`] and leave the controller untouched.
    pub fn set_position(&mut self, index: usize) -> Result<(), TimelineError> {
        debug_assert!(
            index < self.len,
            "playback position {index} out of range for history of length {}",
            self.len
        );
        if index >= self.len {
            return Err(TimelineError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }

        self.halt(PlaybackState::Stopped);
        self.position = index;
        Ok(())
    }

    /// Apply a single tick: advance by one and halt at the newest snapshot.
    ///
    /// Returns the new position, or `None` when not playing.
    pub fn advance(&mut self) -> Option<usize> {
        if self.state != PlaybackState::Playing {
            return None;
        }

        self.position = (self.position + 1).min(self.len.saturating_sub(1));
        debug!(position = self.position, len = self.len, "Playback advanced");

        if self.is_newest() {
            info!(position = self.position, "Playback reached newest snapshot");
            self.halt(PlaybackState::AtEnd);
        }

        Some(self.position)
    }

    /// Wait for the next clock tick and apply it.
    ///
    /// Resolves to `None` immediately when not playing. Cancel safe, suitable for
    /// `tokio::select!`.
    pub async fn next_tick(&mut self) -> Option<usize> {
        let tick = self.clock.as_mut()?.tick().await;
        match tick {
            Some(_) => self.advance(),
            None => {
                error!("playback clock terminated unexpectedly");
                self.halt(PlaybackState::Stopped);
                None
            }
        }
    }

    /// Replace the history length, stopping playback and resting on the newest snapshot.
    pub fn reset(&mut self, len: usize) {
        self.halt(PlaybackState::Stopped);
        self.len = len;
        self.position = len.saturating_sub(1);
    }

    fn halt(&mut self, state: PlaybackState) {
        self.clock = None;
        self.state = state;
    }

    #[cfg(test)]
    pub(crate) fn clock_abort_handle(&self) -> Option<tokio::task::AbortHandle> {
        self.clock.as_ref().map(|clock| clock.handle.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1500);

    #[test]
    fn test_new_rests_on_newest() {
        let controller = PlaybackController::new(4, TICK);
        assert_eq!(controller.position(), 3);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_play_short_histories() {
        struct TestCase {
            len: usize,
            expected: PlaybackState,
        }

        let tests = vec![
            TestCase {
                // TC0: empty history stays stopped
                len: 0,
                expected: PlaybackState::Stopped,
            },
            TestCase {
                // TC1: single snapshot is already at the end
                len: 1,
                expected: PlaybackState::AtEnd,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut controller = PlaybackController::new(test.len, TICK);
            controller.play();
            assert_eq!(controller.state(), test.expected, "TC{} failed", index);
            assert!(!controller.is_running(), "TC{} failed", index);
            assert_eq!(controller.position(), 0, "TC{} failed", index);
        }
    }

    #[test]
    fn test_play_without_runtime_stays_stopped() {
        let mut controller = PlaybackController::new(3, TICK);
        controller.play();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_advance_requires_playing() {
        let mut controller = PlaybackController::new(3, TICK);
        controller.set_position(0).unwrap();
        assert_eq!(controller.advance(), None);
        assert_eq!(controller.position(), 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "out of range"))]
    fn test_set_position_out_of_range() {
        let mut controller = PlaybackController::new(2, TICK);
        assert_eq!(
            controller.set_position(2),
            Err(TimelineError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(controller.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_snapshots_reach_end_after_one_tick() {
        let mut controller = PlaybackController::new(2, TICK);
        controller.set_position(0).unwrap();
        controller.play();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.position(), 0);

        assert_eq!(controller.next_tick().await, Some(1));
        assert_eq!(controller.state(), PlaybackState::AtEnd);
        assert!(!controller.is_running());

        // Further ticks never advance past the end
        tokio::time::advance(TICK * 3).await;
        assert_eq!(controller.next_tick().await, None);
        assert_eq!(controller.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let mut controller = PlaybackController::new(3, TICK);
        controller.set_position(0).unwrap();
        controller.play();

        let started = Instant::now();
        assert_eq!(controller.next_tick().await, Some(1));
        assert!(started.elapsed() >= TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_from_newest_rewinds() {
        let mut controller = PlaybackController::new(3, TICK);
        controller.play();
        assert_eq!(controller.position(), 0);
        assert_eq!(controller.state(), PlaybackState::Playing);

        assert_eq!(controller.next_tick().await, Some(1));
        assert_eq!(controller.next_tick().await, Some(2));
        assert_eq!(controller.state(), PlaybackState::AtEnd);

        // Replaying from the end starts over
        controller.play();
        assert_eq!(controller.position(), 0);
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_sequence_freezes_position() {
        let mut controller = PlaybackController::new(5, TICK);
        controller.set_position(0).unwrap();
        controller.play();
        assert_eq!(controller.next_tick().await, Some(1));

        controller.stop();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_running());

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(controller.next_tick().await, None);
        assert_eq!(controller.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_queued_ticks() {
        let mut controller = PlaybackController::new(5, TICK);
        controller.set_position(0).unwrap();
        controller.play();

        // Let the clock queue a tick that is never consumed
        tokio::time::advance(TICK * 2).await;
        tokio::task::yield_now().await;

        controller.stop();
        controller.advance();
        assert_eq!(controller.position(), 0);
        assert_eq!(controller.next_tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_while_playing_stops() {
        let mut controller = PlaybackController::new(5, TICK);
        controller.set_position(0).unwrap();
        controller.play();
        assert_eq!(controller.next_tick().await, Some(1));

        controller.set_position(3).unwrap();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_running());

        tokio::time::advance(TICK * 4).await;
        assert_eq!(controller.next_tick().await, None);
        assert_eq!(controller.position(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_and_moves_to_newest() {
        let mut controller = PlaybackController::new(5, TICK);
        controller.set_position(0).unwrap();
        controller.play();

        controller.reset(8);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_running());
        assert_eq!(controller.len(), 8);
        assert_eq!(controller.position(), 7);
    }

    async fn playing_from_start(len: usize) -> (PlaybackController, tokio::task::AbortHandle) {
        let mut controller = PlaybackController::new(len, TICK);
        controller.set_position(0).unwrap();
        controller.play();
        assert_eq!(controller.next_tick().await, Some(1));

        let clock = controller.clock_abort_handle().unwrap();
        assert!(!clock.is_finished());
        (controller, clock)
    }

    async fn settle() {
        tokio::task::yield_now().await;
        tokio::time::advance(TICK * 4).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_playing_controller_ends_clock_task() {
        let (controller, clock) = playing_from_start(5).await;

        drop(controller);
        settle().await;

        assert!(clock.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_clock_task() {
        let (mut controller, clock) = playing_from_start(5).await;

        controller.stop();
        settle().await;

        assert!(clock.is_finished());
        assert_eq!(controller.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaching_end_ends_clock_task() {
        let mut controller = PlaybackController::new(2, TICK);
        controller.set_position(0).unwrap();
        controller.play();
        let clock = controller.clock_abort_handle().unwrap();

        assert_eq!(controller.next_tick().await, Some(1));
        assert_eq!(controller.state(), PlaybackState::AtEnd);
        settle().await;

        assert!(clock.is_finished());
    }
}
