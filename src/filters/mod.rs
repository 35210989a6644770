//! Smoothing filters for tracked face geometry.
//!
//! Filters operate on a five-element state `[x, y, z, width, height]`
//! and may extrapolate it by the time elapsed since the measurement.

/// Double exponential (level + trend) smoothing with short-horizon prediction
pub mod double_exponential;

use crate::Result;
use nalgebra::Vector5;

/// Trait for all face geometry filters
pub trait TrackFilter: Send + Sync {
    /// Feed a measurement; returns the filtered value `elapsed_ms` after it
    fn apply(&mut self, value: &Vector5<f64>, elapsed_ms: f64) -> Vector5<f64>;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl TrackFilter for NoFilter {
    fn apply(&mut self, value: &Vector5<f64>, _elapsed_ms: f64) -> Vector5<f64> {
        *value
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

fn parse_param(spec: &str, value: Option<&str>, default: f64) -> Result<f64> {
    match value {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| crate::Error::FilterError(format!("Invalid parameter '{raw}' in filter '{spec}'"))),
    }
}

/// Create a filter from `name[:param[:param]]`
///
/// Known names: `none`, `double_exponential[:alpha[:interval_ms]]`.
///
/// # Errors
///
/// Returns [`crate::Error::FilterError`] for unknown names or invalid parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn TrackFilter>> {
    let mut parts = spec.split(':');
    let name = parts.next().unwrap_or_default().trim().to_lowercase();
    match name.as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "double_exponential" | "doubleexponential" | "dexp" => {
            let alpha = parse_param(spec, parts.next(), crate::constants::DEFAULT_SMOOTHING_ALPHA)?;
            let interval = parse_param(spec, parts.next(), crate::constants::DEFAULT_SMOOTHING_INTERVAL_MS)?;
            Ok(Box::new(double_exponential::DoubleExponentialSmoother::new(alpha, interval)?))
        }
        _ => Err(crate::Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}
