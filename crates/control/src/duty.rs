use crate::history::round_to;
use stirling_core::{DutyRange, Range};

/// Affine map from a measurement domain onto a duty range.
#[derive(Debug, Clone, Copy, Default)]
pub struct DutyMapper {
    duty: DutyRange,
}

impl DutyMapper {
    pub fn new(duty: DutyRange) -> Self {
        Self { duty }
    }

    pub fn duty(&self) -> DutyRange {
        self.duty
    }

    /// Duty fraction for `x` over `domain`. See [`map_duty`].
    pub fn map(&self, x: f64, domain: Range) -> f64 {
        map_duty(x, domain, self.duty)
    }
}

/// `y = (max - min) / (high - low) * (x - low) + min`, rounded to two
/// decimals and clamped to `[min, max]`.
///
/// A zero-width domain yields `duty.min()`, the idling duty. A fresh
/// controller hits this on its first sample when the initial guess is
/// degenerate.
pub fn map_duty(x: f64, domain: Range, duty: DutyRange) -> f64 {
    let width = domain.width();
    if width == 0.0 {
        return duty.min();
    }

    let slope = (duty.max() - duty.min()) / width;
    let y = round_to(slope * (x - domain.low) + duty.min(), 2);
    y.max(duty.min()).min(duty.max())
}
