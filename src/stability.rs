//! Sliding-window stability checks.
//!
//! Used twice by the tracker: to wait for the camera's auto whitebalance to
//! settle before detecting, and to wait for a steady face size before the
//! head-position estimator is calibrated.

use std::collections::VecDeque;

/// Fixed-length window of recent samples
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl StabilityWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a sample, evicting the oldest once full
    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Summary of the current samples
    #[must_use]
    pub fn stats(&self) -> Option<Statistics> {
        if self.samples.is_empty() {
            return None;
        }
        Some(Statistics::from_samples(&self.samples))
    }

    /// Full and `max - min < tolerance`
    #[must_use]
    pub fn is_stable(&self, tolerance: f64) -> bool {
        self.is_full() && self.stats().is_some_and(|s| s.range < tolerance)
    }

    /// Full and `(max - min) / mean < tolerance`
    #[must_use]
    pub fn is_relatively_stable(&self, tolerance: f64) -> bool {
        self.is_full()
            && self
                .stats()
                .is_some_and(|s| s.mean.abs() > f64::EPSILON && s.range / s.mean.abs() < tolerance)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Statistical summary of a data window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Mean value of the data
    pub mean: f64,
    /// Standard deviation of the data
    pub std_dev: f64,
    /// Minimum value in the window
    pub min: f64,
    /// Maximum value in the window
    pub max: f64,
    /// Range (max - min) of the data
    pub range: f64,
}

impl Statistics {
    #[allow(clippy::cast_precision_loss)]
    fn from_samples(data: &VecDeque<f64>) -> Self {
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            range: max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_stable_until_full() {
        let mut window = StabilityWindow::new(5);
        for _ in 0..4 {
            window.push(100.0);
            assert!(!window.is_stable(2.0));
        }
        window.push(100.0);
        assert!(window.is_stable(2.0));
    }

    #[test]
    fn test_range_tolerance_is_strict() {
        let mut window = StabilityWindow::new(3);
        for value in [10.0, 12.0, 11.0] {
            window.push(value);
        }
        assert!(!window.is_stable(2.0));
        assert!(window.is_stable(2.5));
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut window = StabilityWindow::new(3);
        for value in [50.0, 10.0, 10.5, 11.0] {
            window.push(value);
        }
        assert_eq!(window.len(), 3);
        let stats = window.stats().unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 11.0);
        assert!((stats.mean - 10.5).abs() < 1e-12);
        assert!(window.is_stable(2.0));
    }

    #[test]
    fn test_relative_stability() {
        let mut window = StabilityWindow::new(4);
        for value in [100.0, 104.0, 98.0, 101.0] {
            window.push(value);
        }
        // spread 6 over mean 100.75
        assert!(window.is_relatively_stable(0.1));
        assert!(!window.is_relatively_stable(0.05));
    }

    #[test]
    fn test_zero_mean_is_never_relatively_stable() {
        let mut window = StabilityWindow::new(2);
        window.push(0.0);
        window.push(0.0);
        assert!(!window.is_relatively_stable(0.1));
    }

    #[test]
    fn test_reset() {
        let mut window = StabilityWindow::new(2);
        window.push(1.0);
        window.push(1.0);
        window.reset();
        assert!(window.is_empty());
        assert!(window.stats().is_none());
        assert_eq!(window.capacity(), 2);
    }
}
