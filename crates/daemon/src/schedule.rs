use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use stirling_config::Schedule;
use stirling_control::DataSource;
use stirling_core::ControlEvent;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Delay before the first sampling tick.
///
/// `Interval` starts immediately. `Aligned` waits for the next wall-clock
/// multiple of `every`, so a 60 s schedule fires on the minute.
pub fn first_tick_delay(schedule: Schedule, every: Duration, now: DateTime<Utc>) -> Duration {
    match schedule {
        Schedule::Interval => Duration::ZERO,
        Schedule::Aligned => {
            let every_ms = every.as_millis() as i64;
            if every_ms == 0 {
                return Duration::ZERO;
            }
            let into_cycle = now.timestamp_millis().rem_euclid(every_ms);
            if into_cycle == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis((every_ms - into_cycle) as u64)
            }
        }
    }
}

/// Fetch from `source` on schedule and forward each result as a [`ControlEvent`].
///
/// Runs until `stop` fires, its sender is dropped, or the receiver side of
/// `events` is gone. A pending fetch is abandoned on stop. Dropping `events`
/// on return closes the channel.
pub async fn sample_loop(
    source: Arc<dyn DataSource>,
    schedule: Schedule,
    every: Duration,
    events: mpsc::Sender<ControlEvent>,
    mut stop: watch::Receiver<bool>,
) {
    let delay = first_tick_delay(schedule, every, Utc::now());
    info!(
        "Sampling '{}' every {}s (first tick in {}ms)",
        source.id(),
        every.as_secs(),
        delay.as_millis()
    );

    let mut ticker = time::interval_at(Instant::now() + delay, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        let result = tokio::select! {
            result = source.fetch() => result,
            _ = stop.changed() => break,
        };

        if events.send(ControlEvent::from_fetch(source.id(), result)).await.is_err() {
            break;
        }
    }

    debug!("Sampling '{}' stopped", source.id());
}
