use itertools::Itertools;
use signalgrid_timeline::{
    FeedClient, HistoryStore, TimelineConfig, TimelineSession, signal_counts, status_flips,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    let config = TimelineConfig::from_env();
    info!(
        feed_url = %config.feed_url,
        tick_interval = ?config.tick_interval,
        window_span = ?config.window_span,
        "Starting SignalGrid replay"
    );

    let client = match FeedClient::new(&config) {
        Ok(client) => client,
        Err(error) => {
            error!(%error, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let history = client.fetch_history().await;
    if history.is_empty() {
        warn!("No timeline data available, nothing to replay");
        return;
    }
    log_history(&history);

    let mut session = TimelineSession::new(history, &config);

    // Replay from the oldest snapshot within the window
    let window = session.window();
    let start = window.to_full_index(0).unwrap_or_default();
    info!(
        visible = window.len(),
        fallback = window.is_fallback(),
        start,
        "Evaluated history window"
    );
    if let Err(error) = session.set_position(start) {
        error!(%error, "Failed to position replay");
        return;
    }

    log_step(&session, None);
    session.play();

    let mut previous = session.position();
    loop {
        tokio::select! {
            tick = session.next_tick() => {
                let Some(position) = tick else {
                    break;
                };
                log_step(&session, Some(previous));
                previous = position;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping replay");
                break;
            }
        }
    }

    session.stop();
    info!(
        position = session.position(),
        state = %session.playback_state(),
        "Replay finished"
    );
}

fn log_history(history: &HistoryStore) {
    let labels = history.iter().map(|snapshot| snapshot.label()).join(" ");
    info!(
        snapshots = history.len(),
        entities = history.live().map_or(0, |live| live.entities().len()),
        %labels,
        "Fetched timeline"
    );
}

fn log_step(session: &TimelineSession, previous: Option<usize>) {
    let Some(snapshot) = session.current_snapshot() else {
        return;
    };

    let sentiment = session.sentiment();
    let signals = signal_counts(snapshot.entities());

    let flips = previous
        .and_then(|previous| session.history().get(previous))
        .map(|from| {
            status_flips(from, snapshot)
                .iter()
                .map(|flip| format!("{} {}->{}", flip.ticker, flip.from, flip.to))
                .join(", ")
        })
        .unwrap_or_default();

    info!(
        position = session.position(),
        label = snapshot.label(),
        historical = session.is_historical(),
        bullish = sentiment.bullish,
        bearish = sentiment.bearish,
        percent = sentiment.percent,
        golden_cross = signals.golden_cross,
        death_cross = signals.death_cross,
        %flips,
        "Snapshot"
    );
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
