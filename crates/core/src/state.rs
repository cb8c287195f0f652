use serde::{Deserialize, Serialize};

/// A single measurement from a data source. Unit-agnostic.
pub type Measurement = f64;

/// Adaptive measurement bounds, `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Range {
    pub low:  f64,
    pub high: f64,
}

impl Range {
    /// Build a range, swapping the endpoints if they arrive reversed.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Distance between the endpoints; zero for a degenerate range.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

impl From<[f64; 2]> for Range {
    fn from([a, b]: [f64; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<Range> for [f64; 2] {
    fn from(r: Range) -> Self {
        [r.low, r.high]
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}-{})", self.low, self.high)
    }
}

/// Duty-cycle bounds. Both endpoints lie in `[0, 1]` and `min < max`.
///
/// `min` is the lowest duty that keeps the engine idling, `max` the highest
/// it tolerates. Construction through [`DutyRange::new`] enforces the bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyRange {
    min: f64,
    max: f64,
}

impl DutyRange {
    /// Returns `None` unless `0 <= min < max <= 1`.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Option<Self> {
        let valid = (0.0..=1.0).contains(&min) && (0.0..=1.0).contains(&max) && min < max;
        valid.then_some(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }
}

impl Default for DutyRange {
    fn default() -> Self {
        Self { min: 0.2, max: 0.7 }
    }
}

/// Everything the ingestor knows after accepting one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Configured key of the source that produced the sample.
    pub source:  String,
    pub raw:     Measurement,
    /// History contents in arrival order, oldest first.
    pub history: Vec<Measurement>,
    pub average: f64,
    pub range:   Range,
    pub duty:    f64,
}
