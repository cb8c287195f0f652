use stirling_core::{Measurement, Range};
use tracing::info;

/// Optional visual readout of the latest sample.
///
/// Implementations clamp their own drawing bounds and never feed anything
/// back into the control state.
pub trait Display: Send {
    fn render(&mut self, value: Measurement, range: Range);
}

/// No display attached.
#[derive(Debug, Default)]
pub struct NoDisplay;

impl Display for NoDisplay {
    fn render(&mut self, _value: Measurement, _range: Range) {}
}

/// Renders a fixed-width text gauge into the log, e.g. `[######----] 12`.
#[derive(Debug)]
pub struct GaugeDisplay {
    width: usize,
}

impl GaugeDisplay {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    /// Gauge line for `value` within `range`.
    pub fn gauge(&self, value: Measurement, range: Range) -> String {
        let filled = if range.width() == 0.0 {
            0
        } else {
            let clamped = value.clamp(range.low, range.high);
            let fraction = (clamped - range.low) / range.width();
            (fraction * self.width as f64).round() as usize
        };
        format!(
            "[{}{}] {value}",
            "#".repeat(filled),
            "-".repeat(self.width - filled)
        )
    }
}

impl Default for GaugeDisplay {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Display for GaugeDisplay {
    fn render(&mut self, value: Measurement, range: Range) {
        info!(target: "stirling::display", "{} {range}", self.gauge(value, range));
    }
}
