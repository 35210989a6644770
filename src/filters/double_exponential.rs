use super::TrackFilter;
use crate::constants::{DEFAULT_SMOOTHING_ALPHA, DEFAULT_SMOOTHING_INTERVAL_MS};
use crate::{Error, Result};
use nalgebra::Vector5;

/// How predictions between update intervals are formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionMode {
    /// Whole intervals only
    #[default]
    Discrete,
    /// Linear in the fractional interval
    Interpolated,
}

/// Double exponential smoothing filter
///
/// Keeps a smoothed level `sp` and a doubly smoothed `sp2`; their difference
/// estimates the trend used to predict ahead by whole update intervals.
#[derive(Debug, Clone)]
pub struct DoubleExponentialSmoother {
    alpha: f64,
    interval_ms: f64,
    mode: PredictionMode,
    sp: Vector5<f64>,
    sp2: Vector5<f64>,
    initialized: bool,
}

impl Default for DoubleExponentialSmoother {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_SMOOTHING_ALPHA,
            interval_ms: DEFAULT_SMOOTHING_INTERVAL_MS,
            mode: PredictionMode::Discrete,
            sp: Vector5::zeros(),
            sp2: Vector5::zeros(),
            initialized: false,
        }
    }
}

impl DoubleExponentialSmoother {
    /// # Errors
    ///
    /// Returns an error unless `0 < alpha <= 1` and `interval_ms > 0`
    pub fn new(alpha: f64, interval_ms: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
        }
        if !(interval_ms > 0.0 && interval_ms.is_finite()) {
            return Err(Error::FilterError(format!(
                "Interval must be positive, got {interval_ms}"
            )));
        }
        Ok(Self {
            alpha,
            interval_ms,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_mode(mut self, mode: PredictionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Smoothed level
    #[must_use]
    pub fn level(&self) -> &Vector5<f64> {
        &self.sp
    }

    /// Seed both stages with `value`
    pub fn init(&mut self, value: &Vector5<f64>) {
        self.sp = *value;
        self.sp2 = *value;
        self.initialized = true;
    }

    /// Blend a measurement into both stages
    pub fn update(&mut self, value: &Vector5<f64>) {
        let a = self.alpha;
        self.sp = value * a + self.sp * (1.0 - a);
        self.sp2 = self.sp * a + self.sp2 * (1.0 - a);
    }

    /// Extrapolate `elapsed_ms` past the last update
    #[must_use]
    pub fn predict(&self, elapsed_ms: f64) -> Vector5<f64> {
        // alpha == 1 carries no trend; avoid dividing by zero
        let ratio = if self.alpha >= 1.0 {
            0.0
        } else {
            self.alpha / (1.0 - self.alpha)
        };
        let step = (elapsed_ms / self.interval_ms).max(0.0);
        let whole = step.floor();
        let base = self.sp * (2.0 + whole * ratio) - self.sp2 * (1.0 + whole * ratio);
        match self.mode {
            PredictionMode::Discrete => base,
            PredictionMode::Interpolated => base + (self.sp - self.sp2) * ((step - whole) * ratio),
        }
    }

    /// Initialize on first use, update and predict
    pub fn smooth(&mut self, value: &Vector5<f64>, elapsed_ms: f64) -> Vector5<f64> {
        if !self.initialized {
            self.init(value);
        }
        self.update(value);
        self.predict(elapsed_ms)
    }
}

impl TrackFilter for DoubleExponentialSmoother {
    fn apply(&mut self, value: &Vector5<f64>, elapsed_ms: f64) -> Vector5<f64> {
        self.smooth(value, elapsed_ms)
    }

    fn reset(&mut self) {
        self.sp = Vector5::zeros();
        self.sp2 = Vector5::zeros();
        self.initialized = false;
    }

    fn name(&self) -> &str {
        "DoubleExponentialSmoother"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(x: f64) -> Vector5<f64> {
        Vector5::new(x, x * 2.0, 0.0, 30.0, 40.0)
    }

    #[test]
    fn test_first_value_passes_through() {
        let mut filter = DoubleExponentialSmoother::new(0.35, 35.0).unwrap();
        assert!((filter.smooth(&v(10.0), 0.0) - v(10.0)).norm() < 1e-9);
        assert!(filter.is_initialized());
    }

    #[test]
    fn test_alpha_one_is_pass_through() {
        let mut filter = DoubleExponentialSmoother::new(1.0, 35.0).unwrap();
        for x in [1.0, 50.0, -20.0, 7.5] {
            assert_eq!(filter.smooth(&v(x), 0.0), v(x));
            assert_eq!(filter.smooth(&v(x), 1000.0), v(x));
        }
    }

    #[test]
    fn test_update_rule() {
        let mut filter = DoubleExponentialSmoother::new(0.5, 35.0).unwrap();
        filter.init(&Vector5::zeros());
        filter.update(&Vector5::repeat(8.0));
        // sp = 4, sp2 = 2; zero horizon gives 2 * sp - sp2
        assert!((filter.level()[0] - 4.0).abs() < 1e-12);
        assert!((filter.predict(0.0)[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_prediction_uses_whole_steps() {
        let mut filter = DoubleExponentialSmoother::new(0.5, 10.0).unwrap();
        filter.init(&Vector5::zeros());
        filter.update(&Vector5::repeat(8.0));
        // ratio = 0.5 * step / 0.5 = step: (2 + step) * 4 - (1 + step) * 2
        assert!((filter.predict(10.0)[0] - 8.0).abs() < 1e-12);
        assert!((filter.predict(19.9)[0] - 8.0).abs() < 1e-12);
        assert!((filter.predict(20.0)[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolated_prediction_is_continuous() {
        let mut filter = DoubleExponentialSmoother::new(0.5, 10.0)
            .unwrap()
            .with_mode(PredictionMode::Interpolated);
        filter.init(&Vector5::zeros());
        filter.update(&Vector5::repeat(8.0));
        assert!((filter.predict(10.0)[0] - 8.0).abs() < 1e-12);
        assert!((filter.predict(15.0)[0] - 9.0).abs() < 1e-12);
        assert!((filter.predict(20.0)[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut filter = DoubleExponentialSmoother::default();
        filter.smooth(&v(3.0), 0.0);
        filter.reset();
        assert!(!filter.is_initialized());
        assert!((filter.smooth(&v(9.0), 0.0) - v(9.0)).norm() < 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(DoubleExponentialSmoother::new(0.0, 35.0).is_err());
        assert!(DoubleExponentialSmoother::new(1.01, 35.0).is_err());
        assert!(DoubleExponentialSmoother::new(f64::NAN, 35.0).is_err());
        assert!(DoubleExponentialSmoother::new(0.5, -1.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_level_converges_monotonically(
            alpha in 0.01f64..0.99,
            start in -500.0f64..500.0,
            target in -500.0f64..500.0,
        ) {
            let mut filter = DoubleExponentialSmoother::new(alpha, 35.0).unwrap();
            filter.init(&Vector5::repeat(start));
            let goal = Vector5::repeat(target);
            let mut distance = (start - target).abs();
            for _ in 0..50 {
                filter.smooth(&goal, 0.0);
                let next = (filter.level()[0] - target).abs();
                prop_assert!(next <= distance + 1e-9);
                distance = next;
            }
        }
    }
}
