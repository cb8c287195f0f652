use stirling_core::{Measurement, Range};

/// Adaptive min/max bounds for one measurement stream.
///
/// Bounds only ever widen. Samples seen before a widening are not revisited.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    range: Range,
}

impl RangeTracker {
    /// Start from the configured initial guess. A zero-width guess is kept as-is.
    pub fn new(initial: Range) -> Self {
        Self { range: initial }
    }

    /// Widen the range to include `value` and return the result.
    pub fn observe(&mut self, value: Measurement) -> Range {
        if value < self.range.low {
            self.range.low = value;
        }
        if value > self.range.high {
            self.range.high = value;
        }
        self.range
    }

    pub fn range(&self) -> Range {
        self.range
    }
}
