//! Checked conversions between pixel coordinate types.
//!
//! Tracking geometry is computed in `f64`, windows live in `i32` (they may
//! hang off the frame edge) and buffers are indexed with `usize`.

use crate::{Error, Result};

/// Convert a buffer dimension to a signed window coordinate
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn usize_to_i32(value: usize) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Floor a coordinate and clamp it into `[min, max]`; non-finite values map to `min`
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn floor_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    if !value.is_finite() {
        return min;
    }
    value.floor().clamp(f64::from(min), f64::from(max)) as i32
}

/// Clamp a signed coordinate to a buffer index range `[0, max]`
#[must_use]
#[allow(clippy::cast_sign_loss)] // Value is non-negative after the clamp
pub fn i32_to_usize_clamp(value: i32, max: usize) -> usize {
    (value.max(0) as usize).min(max)
}
