use embedded_hal::digital::OutputPin;
use std::time::Duration;
use stirling_core::{Result, StirlingError};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Where the driver is within the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmState {
    /// Not yet started, or stopped with the pin low.
    Idle,
    On,
    Off,
}

/// Split one period into `(on, off)` for `duty`, at millisecond resolution.
///
/// `duty` is clamped to `[0, 1]`, so `on + off == interval` always holds.
pub fn pulse_widths(interval: Duration, duty: f64) -> (Duration, Duration) {
    let interval_ms = interval.as_millis() as u64;
    let duty = if duty.is_nan() { 0.0 } else { duty.clamp(0.0, 1.0) };
    let on_ms = ((interval_ms as f64) * duty).round() as u64;
    let on = Duration::from_millis(on_ms.min(interval_ms));
    (on, interval.saturating_sub(on))
}

/// Summary returned when the driver stops cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PwmReport {
    pub periods: u64,
}

/// Software PWM on a single output pin.
///
/// Each period the pin goes high for `duty * interval`, then low for the rest.
/// The duty is read once when a period starts; later updates only affect the
/// next period. The off-timer lives inside the period that armed it, so it can
/// never fire into a following period.
pub struct PwmDriver<P: OutputPin> {
    pin:      P,
    pin_id:   u32,
    interval: Duration,
    duty_rx:  watch::Receiver<f64>,
    state:    PwmState,
}

impl<P: OutputPin> PwmDriver<P> {
    pub fn new(pin: P, pin_id: u32, interval: Duration, duty_rx: watch::Receiver<f64>) -> Self {
        Self {
            pin,
            pin_id,
            interval,
            duty_rx,
            state: PwmState::Idle,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The pin is left low on every exit path. A failed write stops the loop
    /// with [`StirlingError::Actuation`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<PwmReport> {
        info!(
            "PWM on pin {} every {}ms",
            self.pin_id,
            self.interval.as_millis()
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = PwmReport::default();

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break Ok(()),
            }

            report.periods += 1;
            let duty = *self.duty_rx.borrow();
            let (on, off) = pulse_widths(self.interval, duty);
            debug!("period {}: duty {duty} on {on:?} off {off:?}", report.periods);

            match self.period(on, off, &mut shutdown).await {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                self.go_low()?;
                self.state = PwmState::Idle;
                info!("PWM on pin {} stopped after {} periods", self.pin_id, report.periods);
                Ok(report)
            }
            Err(e) => {
                error!("PWM on pin {} halted: {e}", self.pin_id);
                // Best effort: the pin may already be unwritable.
                let _ = self.pin.set_low();
                self.state = PwmState::Idle;
                Err(e)
            }
        }
    }

    /// Drive one period. Returns `false` if shutdown arrived mid-pulse.
    async fn period(&mut self, on: Duration, off: Duration, shutdown: &mut watch::Receiver<bool>) -> Result<bool> {
        if on.is_zero() {
            self.go_low()?;
            return Ok(true);
        }

        self.set_high()?;
        if off.is_zero() {
            // Full duty: stay high into the next period.
            return Ok(true);
        }

        tokio::select! {
            _ = time::sleep(on) => {
                self.go_low()?;
                Ok(true)
            }
            _ = shutdown.changed() => {
                self.go_low()?;
                Ok(false)
            }
        }
    }

    fn set_high(&mut self) -> Result<()> {
        if self.state != PwmState::On {
            self.pin.set_high().map_err(|e| self.actuation(e))?;
        }
        self.state = PwmState::On;
        Ok(())
    }

    fn go_low(&mut self) -> Result<()> {
        if self.state != PwmState::Off {
            self.pin.set_low().map_err(|e| self.actuation(e))?;
        }
        self.state = PwmState::Off;
        Ok(())
    }

    fn actuation(&self, e: impl std::fmt::Debug) -> StirlingError {
        StirlingError::Actuation {
            pin:    self.pin_id,
            reason: format!("{e:?}"),
        }
    }
}
