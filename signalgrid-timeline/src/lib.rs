//! # SignalGrid Timeline
//!
//! Temporal snapshot engine for the SignalGrid market dashboard. A single feed document carries a
//! live baseline of instruments plus partial historical records; this crate turns it into a
//! navigable, playable timeline:
//!
//! - [`normalize`]: raw feed records into canonical [`Entity`]s.
//! - [`merge`]: historical partial records over the baseline, one [`Snapshot`] per timestamp.
//! - [`history`]: the immutable, timestamp-ordered [`HistoryStore`].
//! - [`window`]: recent-history view with index translation to and from the store.
//! - [`playback`]: cancellable timer-driven [`PlaybackController`].
//! - [`metrics`]: sentiment and signal statistics over an entity set.
//! - [`feed`]: one-shot HTTP retrieval of the document.
//! - [`session`]: the [`TimelineSession`] tying it all together.
//!
//! ```rust,no_run
//! use signalgrid_timeline::{FeedClient, TimelineConfig, TimelineSession};
//!
//! # async fn run() -> Result<(), signalgrid_timeline::ConfigError> {
//! let config = TimelineConfig::from_env();
//! let history = FeedClient::new(&config)?.fetch_history().await;
//!
//! let mut session = TimelineSession::new(history, &config);
//! session.play();
//! while let Some(position) = session.next_tick().await {
//!     println!("{position}: {} {:?}", session.label(), session.sentiment());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;

/// All [`Error`](std::error::Error)s generated in SignalGrid Timeline.
pub mod error;

pub mod feed;
pub mod history;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod playback;
pub mod session;
pub mod types;
pub mod window;

// Re-export commonly used types for convenience
pub use config::TimelineConfig;
pub use error::{ConfigError, FetchError, RecordError, TimelineError};
pub use feed::{FeedClient, FeedPayload, history_from_slice};
pub use history::HistoryStore;
pub use metrics::{Sentiment, SignalCounts, StatusFlip, sentiment, signal_counts, status_flips};
pub use normalize::{Baseline, normalize_baseline};
pub use playback::{PlaybackController, PlaybackState};
pub use session::TimelineSession;
pub use types::{CrossSignal, Entity, LIVE_LABEL, Snapshot, SnapshotKind, Status, Ticker};
pub use window::HistoryWindow;
