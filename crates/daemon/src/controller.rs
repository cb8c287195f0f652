use crate::{pin::HeaterPin, schedule::sample_loop};
use embedded_hal::digital::OutputPin;
use std::sync::Arc;
use std::time::Duration;
use stirling_config::{ControllerConfig, DisplayKind};
use stirling_control::{DataSource, Display, GaugeDisplay, IngestStats, NoDisplay, SampleIngestor};
use stirling_core::{Result, StirlingError};
use stirling_pwm::{PwmDriver, PwmReport};
use stirling_sources::HttpSource;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// How long in-flight sink sends may run after shutdown before being aborted.
const SINK_GRACE: Duration = Duration::from_secs(2);

/// Outcome of a controller run that ended by shutdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerReport {
    pub samples:   IngestStats,
    pub pwm:       PwmReport,
    pub last_duty: f64,
}

/// Owns one source's control state and the heater pin for the process lifetime.
pub struct Controller<P> {
    config:   ControllerConfig,
    source:   Arc<dyn DataSource>,
    ingestor: SampleIngestor,
    pin:      P,
}

impl Controller<HeaterPin> {
    /// Build the production collaborators: HTTP source, display, GPIO pin.
    pub fn from_config(config: ControllerConfig) -> Result<Self> {
        let source: Arc<dyn DataSource> = Arc::new(HttpSource::new(&config.source)?);
        let display: Box<dyn Display> = match config.display {
            DisplayKind::None => Box::new(NoDisplay),
            DisplayKind::Gauge => Box::new(GaugeDisplay::default()),
        };
        let pin = HeaterPin::open(config.pin_backend, config.heater_pin)?;
        Ok(Self::new(config, source, display, pin))
    }
}

impl<P> Controller<P>
where
    P: OutputPin + Send + 'static,
{
    pub fn new(config: ControllerConfig, source: Arc<dyn DataSource>, display: Box<dyn Display>, pin: P) -> Self {
        let ingestor = SampleIngestor::new(
            source.id(),
            config.initial_range,
            config.history_capacity,
            config.duty,
        )
        .with_sink(source.sink())
        .with_display(display);

        Self { config, source, ingestor, pin }
    }

    /// Current duty fraction.
    pub fn duty(&self) -> f64 {
        self.ingestor.duty()
    }

    /// Run PWM and sampling until `shutdown` fires.
    ///
    /// The two activities are separate tasks: a slow or hung fetch never
    /// delays a PWM period. An actuation failure ends the run with that error
    /// after sampling has been stopped. A panicked sampling task ends it with
    /// [`StirlingError::Task`]. The pin is low and no sink send is left
    /// running on every return.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<ControllerReport> {
        let Self { config, source, mut ingestor, pin } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let driver = PwmDriver::new(pin, config.heater_pin, config.pwm_interval, ingestor.subscribe());
        let mut pwm_task = tokio::spawn(driver.run(stop_rx.clone()));
        let sampler = tokio::spawn(sample_loop(
            Arc::clone(&source),
            config.schedule,
            config.sample_every,
            event_tx,
            stop_rx,
        ));

        info!("Controller started for '{}'", source.id());

        let mut pwm_outcome = None;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => {
                        ingestor.handle(event);
                    }
                    None => break,
                },
                joined = &mut pwm_task => {
                    pwm_outcome = Some(joined);
                    break;
                }
                _ = shutdown.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        drop(event_rx);
        let sampled = sampler.await.map_err(|e| {
            error!("Sampling task ended abnormally: {e}");
            StirlingError::Task(format!("sampling task for '{}': {e}", source.id()))
        });

        let joined = match pwm_outcome {
            Some(joined) => joined,
            None => pwm_task.await,
        };
        let pwm = joined.map_err(|e| StirlingError::Actuation {
            pin:    config.heater_pin,
            reason: format!("PWM task ended abnormally: {e}"),
        });
        ingestor.drain_sinks(SINK_GRACE).await;
        let pwm = pwm??;
        sampled?;

        let report = ControllerReport {
            samples:   ingestor.stats(),
            pwm,
            last_duty: ingestor.duty(),
        };
        info!(
            "Controller stopped: {} samples, {} fetch failures, {} sink failures",
            report.samples.accepted, report.samples.fetch_failures, report.samples.sink_failures
        );
        Ok(report)
    }
}

/// Build the production collaborators for a resolved config and run until `shutdown`.
pub async fn run(config: ControllerConfig, shutdown: watch::Receiver<bool>) -> Result<ControllerReport> {
    let controller = Controller::from_config(config).inspect_err(|e| error!("Refusing to start: {e}"))?;
    controller.run(shutdown).await
}
