use std::collections::VecDeque;
use stirling_core::Measurement;

/// Fixed-capacity FIFO of the most recent samples, in arrival order.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples:  VecDeque<Measurement>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new sample, evicting the oldest if at capacity.
    pub fn push(&mut self, value: Measurement) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Running average rounded to one decimal place, half away from zero.
    ///
    /// Returns `0.0` for an empty buffer.
    pub fn average(&self) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            1 => round_to(self.samples[0], 1),
            n => round_to(self.samples.iter().sum::<f64>() / n as f64, 1),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the buffer contents, oldest first.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.samples.iter().copied().collect()
    }
}

/// Round to `places` decimals. `f64::round` rounds half away from zero.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(HistoryBuffer::new(3).average(), 0.0);
    }

    #[test]
    fn single_sample_is_rounded() {
        let mut h = HistoryBuffer::new(5);
        h.push(4.0);
        assert_eq!(h.average(), 4.0);

        let mut h = HistoryBuffer::new(5);
        h.push(3.14159);
        assert_eq!(h.average(), 3.1);
    }

    #[test]
    fn mean_rounds_half_away_from_zero() {
        let mut h = HistoryBuffer::new(2);
        h.push(1.0);
        h.push(1.5);
        // 1.25 -> 1.3, not banker's 1.2
        assert_eq!(h.average(), 1.3);

        let mut h = HistoryBuffer::new(2);
        h.push(-1.0);
        h.push(-1.5);
        assert_eq!(h.average(), -1.3);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut h = HistoryBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            h.push(v);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.snapshot(), vec![2.0, 3.0, 4.0]);
        h.push(5.0);
        assert_eq!(h.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut h = HistoryBuffer::new(4);
        for i in 0..50 {
            h.push(f64::from(i));
            assert!(h.len() <= h.capacity());
        }
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut h = HistoryBuffer::new(0);
        h.push(7.0);
        h.push(9.0);
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.snapshot(), vec![9.0]);
    }

    #[test]
    fn average_stays_within_sample_bounds() {
        let mut h = HistoryBuffer::new(5);
        for v in [3.0, 17.0, 4.0, 11.0, 9.0, 2.0, 20.0] {
            h.push(v);
            let snap = h.snapshot();
            let lo = snap.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = snap.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = h.average();
            assert!(avg >= lo && avg <= hi, "{avg} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn three_sample_window() {
        let mut h = HistoryBuffer::new(3);
        for v in [5.0, 7.0, 9.0] {
            h.push(v);
        }
        assert_eq!(h.average(), 7.0);
    }
}
