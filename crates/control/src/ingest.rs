use crate::{
    display::{Display, NoDisplay},
    duty::DutyMapper,
    history::HistoryBuffer,
    range::RangeTracker,
    source::Sink,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use stirling_core::{ControlEvent, DutyRange, Measurement, Range, SampleRecord};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{info, warn};

/// Sink sends allowed in flight at once. Further samples are not forwarded
/// until one completes.
pub const MAX_SINK_IN_FLIGHT: usize = 8;

/// Running totals kept by the ingestor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted:       u64,
    pub fetch_failures: u64,
    pub sink_failures:  u64,
}

/// Turns raw samples from one source into the shared duty fraction.
///
/// Range and history live here and are touched only by the sampling path.
/// The duty fraction is published through a `watch` channel so the PWM task
/// always sees the latest value without ever waiting on a fetch.
pub struct SampleIngestor {
    source:         String,
    tracker:        RangeTracker,
    history:        HistoryBuffer,
    mapper:         DutyMapper,
    duty_tx:        watch::Sender<f64>,
    sink:           Option<Arc<dyn Sink>>,
    sink_tasks:     JoinSet<()>,
    display:        Box<dyn Display>,
    accepted:       u64,
    fetch_failures: u64,
    sink_failures:  Arc<AtomicU64>,
}

impl SampleIngestor {
    pub fn new(source: impl Into<String>, initial: Range, capacity: usize, duty: DutyRange) -> Self {
        let tracker = RangeTracker::new(initial);
        let history = HistoryBuffer::new(capacity);
        let mapper = DutyMapper::new(duty);
        // Before the first sample the empty history averages to zero.
        let (duty_tx, _) = watch::channel(mapper.map(history.average(), tracker.range()));

        Self {
            source: source.into(),
            tracker,
            history,
            mapper,
            duty_tx,
            sink: None,
            sink_tasks: JoinSet::new(),
            display: Box::new(NoDisplay),
            accepted: 0,
            fetch_failures: 0,
            sink_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_sink(mut self, sink: Option<Arc<dyn Sink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = display;
        self
    }

    /// Receiver for the duty fraction, read once per PWM period.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.duty_tx.subscribe()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn duty(&self) -> f64 {
        *self.duty_tx.borrow()
    }

    pub fn range(&self) -> Range {
        self.tracker.range()
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted:       self.accepted,
            fetch_failures: self.fetch_failures,
            sink_failures:  self.sink_failures.load(Ordering::Relaxed),
        }
    }

    /// Accept one sample: widen range, push history, recompute and publish duty.
    ///
    /// `value` must be finite; [`SampleIngestor::handle`] filters the rest.
    /// If a sink is attached the raw value is forwarded on a tracked task, so
    /// this must be called from within a Tokio runtime in that case.
    pub fn ingest(&mut self, value: Measurement) -> SampleRecord {
        let range = self.tracker.observe(value);
        self.history.push(value);
        let average = self.history.average();
        let duty = self.mapper.map(average, range);
        self.duty_tx.send_replace(duty);
        self.accepted += 1;

        let record = SampleRecord {
            source: self.source.clone(),
            raw: value,
            history: self.history.snapshot(),
            average,
            range,
            duty,
        };

        info!(
            source = %record.source,
            raw = record.raw,
            history = ?record.history,
            average = record.average,
            range = %record.range,
            duty = record.duty,
            "sample accepted"
        );

        self.display.render(value, range);
        self.forward(value);

        record
    }

    /// Dispatch an event from the sampling schedule.
    ///
    /// Samples from any other source are ignored: duty is computed strictly
    /// from the source this ingestor was built for. A non-finite sample counts
    /// as a failed fetch and leaves range and history untouched.
    pub fn handle(&mut self, event: ControlEvent) -> Option<SampleRecord> {
        match event {
            ControlEvent::Sample { source, value } if source == self.source && !value.is_finite() => {
                self.fetch_failures += 1;
                warn!("Non-finite sample {value} from '{source}', skipping tick");
                None
            }
            ControlEvent::Sample { source, value } if source == self.source => Some(self.ingest(value)),
            ControlEvent::Sample { source, .. } => {
                warn!("Ignoring sample from unexpected source '{source}'");
                None
            }
            ControlEvent::FetchFailed { source, error } => {
                self.fetch_failures += 1;
                warn!("Fetch from '{source}' failed, skipping tick: {error}");
                None
            }
        }
    }

    /// Sink sends still running.
    pub fn pending_sinks(&self) -> usize {
        self.sink_tasks.len()
    }

    /// Wait up to `grace` for in-flight sink sends, then abort the rest.
    ///
    /// Aborted sends count as sink failures. No sink task outlives this call.
    pub async fn drain_sinks(&mut self, grace: Duration) {
        let tasks = &mut self.sink_tasks;
        let drained = time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_ok() {
            return;
        }

        self.sink_tasks.abort_all();
        let mut aborted = 0;
        while let Some(joined) = self.sink_tasks.join_next().await {
            if joined.is_err() {
                aborted += 1;
            }
        }
        self.sink_failures.fetch_add(aborted, Ordering::Relaxed);
        warn!("Aborted {aborted} sink sends for '{}' at shutdown", self.source);
    }

    fn forward(&mut self, value: Measurement) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        while self.sink_tasks.try_join_next().is_some() {}
        if self.sink_tasks.len() >= MAX_SINK_IN_FLIGHT {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Sink for '{}' has {MAX_SINK_IN_FLIGHT} sends in flight, dropping {value}",
                self.source
            );
            return;
        }

        let failures = Arc::clone(&self.sink_failures);
        let source = self.source.clone();

        self.sink_tasks.spawn(async move {
            if let Err(e) = sink.send(value).await {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!("Sink for '{source}' failed: {e}");
            }
        });
    }
}

impl std::fmt::Debug for SampleIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleIngestor")
            .field("source", &self.source)
            .field("range", &self.tracker.range())
            .field("history", &self.history)
            .field("duty", &self.duty())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;
    use stirling_core::{Result, StirlingError};

    #[derive(Clone, Default)]
    struct RecordingDisplay(Arc<Mutex<Vec<(Measurement, Range)>>>);

    impl RecordingDisplay {
        fn calls(&self) -> Vec<(Measurement, Range)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Display for RecordingDisplay {
        fn render(&mut self, value: Measurement, range: Range) {
            self.0.lock().unwrap().push((value, range));
        }
    }

    fn wind() -> SampleIngestor {
        SampleIngestor::new("wind", Range::new(0.0, 10.0), 3, DutyRange::new(0.2, 0.7).unwrap())
    }

    #[test]
    fn initial_duty_maps_empty_history() {
        let ing = wind();
        assert_eq!(ing.duty(), 0.2);
        assert_eq!(*ing.subscribe().borrow(), 0.2);
    }

    #[test]
    fn three_samples_average_and_map() {
        let mut ing = wind();
        let rx = ing.subscribe();
        ing.ingest(5.0);
        ing.ingest(7.0);
        let record = ing.ingest(9.0);

        assert_eq!(record.history, vec![5.0, 7.0, 9.0]);
        assert_eq!(record.average, 7.0);
        assert_eq!(record.range, Range::new(0.0, 10.0));
        assert_eq!(record.duty, 0.55);
        assert_eq!(*rx.borrow(), 0.55);
    }

    #[test]
    fn widened_range_feeds_next_duty() {
        let mut ing = SampleIngestor::new("wind", Range::new(0.0, 10.0), 1, DutyRange::new(0.2, 0.7).unwrap());
        let first = ing.ingest(12.0);
        assert_eq!(first.range, Range::new(0.0, 12.0));
        assert_eq!(first.duty, 0.7);

        // 0.5 / 12 * 6 + 0.2 = 0.45 against the widened range, 0.5 against the original.
        let second = ing.ingest(6.0);
        assert_eq!(second.range, Range::new(0.0, 12.0));
        assert_eq!(second.duty, 0.45);
    }

    #[test]
    fn single_sample_into_larger_window() {
        let mut ing = SampleIngestor::new("agents", Range::new(0.0, 20.0), 5, DutyRange::default());
        let record = ing.ingest(4.0);
        assert_eq!(record.average, 4.0);
        assert_eq!(record.history.len(), 1);
    }

    #[test]
    fn degenerate_initial_range_idles_on_first_sample() {
        let mut ing = SampleIngestor::new("aircraft", Range::new(0.0, 0.0), 1, DutyRange::default());
        assert_eq!(ing.duty(), 0.2);
        assert_eq!(ing.ingest(0.0).duty, 0.2);
        assert_eq!(ing.ingest(10.0).duty, 0.7);
    }

    #[test]
    fn fetch_failure_leaves_state_untouched() {
        let mut ing = wind();
        ing.ingest(8.0);
        let before = (ing.range(), ing.duty());

        let out = ing.handle(ControlEvent::FetchFailed {
            source: "wind".into(),
            error:  StirlingError::Fetch("timeout".into()),
        });

        assert!(out.is_none());
        assert_eq!((ing.range(), ing.duty()), before);
        assert_eq!(ing.stats().fetch_failures, 1);
        assert_eq!(ing.stats().accepted, 1);
    }

    #[test]
    fn samples_from_other_sources_are_ignored() {
        let mut ing = wind();
        let out = ing.handle(ControlEvent::Sample { source: "aircraft".into(), value: 99.0 });
        assert!(out.is_none());
        assert_eq!(ing.range(), Range::new(0.0, 10.0));
        assert_eq!(ing.stats().accepted, 0);
    }

    struct RecordingSink {
        seen: Mutex<Vec<Measurement>>,
        fail: bool,
    }

    impl Sink for RecordingSink {
        fn send(&self, value: Measurement) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(value);
                if self.fail {
                    Err(StirlingError::Sink("503".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn sink_receives_raw_values() {
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()), fail: false });
        let mut ing = wind().with_sink(Some(sink.clone()));
        ing.ingest(3.0);
        ing.ingest(4.0);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*sink.seen.lock().unwrap(), vec![3.0, 4.0]);
        assert_eq!(ing.stats().sink_failures, 0);
    }

    #[tokio::test]
    async fn sink_failure_does_not_disturb_control() {
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()), fail: true });
        let mut ing = wind().with_sink(Some(sink));
        let record = ing.ingest(7.0);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(record.duty, 0.55);
        assert_eq!(ing.duty(), 0.55);
        assert_eq!(ing.stats().sink_failures, 1);
        assert_eq!(ing.stats().accepted, 1);
    }

    #[test]
    fn display_sees_raw_value_and_widened_range() {
        let display = RecordingDisplay::default();
        let mut ing = wind().with_display(Box::new(display.clone()));

        ing.handle(ControlEvent::Sample { source: "wind".into(), value: 4.0 });
        ing.handle(ControlEvent::Sample { source: "wind".into(), value: 14.0 });
        ing.handle(ControlEvent::Sample { source: "aircraft".into(), value: 50.0 });
        ing.handle(ControlEvent::FetchFailed {
            source: "wind".into(),
            error:  StirlingError::Fetch("timeout".into()),
        });

        assert_eq!(
            display.calls(),
            vec![(4.0, Range::new(0.0, 10.0)), (14.0, Range::new(0.0, 14.0))]
        );
        assert_eq!(ing.range(), Range::new(0.0, 14.0));
    }

    #[test]
    fn non_finite_sample_is_a_skipped_tick() {
        let display = RecordingDisplay::default();
        let mut ing = wind().with_display(Box::new(display.clone()));

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(ing.handle(ControlEvent::Sample { source: "wind".into(), value }).is_none());
        }
        assert_eq!(ing.range(), Range::new(0.0, 10.0));
        assert_eq!(ing.stats().fetch_failures, 3);
        assert_eq!(ing.stats().accepted, 0);
        assert!(display.calls().is_empty());

        let record = ing.handle(ControlEvent::Sample { source: "wind".into(), value: 10.0 }).unwrap();
        assert_eq!(record.history, vec![10.0]);
        assert_eq!(record.duty, 0.7);
    }

    struct StuckSink;

    impl Sink for StuckSink {
        fn send(&self, _value: Measurement) -> BoxFuture<'_, Result<()>> {
            Box::pin(futures::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_stuck_sends() {
        let sink: Arc<dyn Sink> = Arc::new(StuckSink);
        let mut ing = wind().with_sink(Some(Arc::clone(&sink)));
        for v in [1.0, 2.0, 3.0, 4.0] {
            ing.ingest(v);
        }
        tokio::task::yield_now().await;
        assert_eq!(ing.pending_sinks(), 4);

        ing.drain_sinks(Duration::from_secs(2)).await;

        assert_eq!(ing.pending_sinks(), 0);
        assert_eq!(ing.stats().sink_failures, 4);
        // Only this test and the ingestor still hold the sink.
        assert_eq!(Arc::strong_count(&sink), 2);
    }

    #[tokio::test]
    async fn drain_waits_for_quick_sends() {
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()), fail: false });
        let mut ing = wind().with_sink(Some(sink.clone()));
        ing.ingest(5.0);
        ing.drain_sinks(Duration::from_secs(2)).await;

        assert_eq!(*sink.seen.lock().unwrap(), vec![5.0]);
        assert_eq!(ing.stats().sink_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_sends_are_bounded() {
        let mut ing = wind().with_sink(Some(Arc::new(StuckSink)));
        for v in 0..12 {
            ing.ingest(f64::from(v));
        }

        assert_eq!(ing.pending_sinks(), MAX_SINK_IN_FLIGHT);
        assert_eq!(ing.stats().sink_failures, 12 - MAX_SINK_IN_FLIGHT as u64);
        assert_eq!(ing.stats().accepted, 12);
        ing.drain_sinks(Duration::from_millis(10)).await;
    }
}
