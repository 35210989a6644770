//! Utility types for window geometry and frame conversion.

pub mod image_conversion;
pub mod safe_cast;

use serde::{Deserialize, Serialize};

/// Integer pixel rectangle; may extend past the frame until clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[must_use]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }

    /// Intersection with a `frame_width` x `frame_height` frame anchored at the origin
    #[must_use]
    pub fn clamp_to(&self, frame_width: i32, frame_height: i32) -> Self {
        let x0 = self.x.clamp(0, frame_width.max(0));
        let y0 = self.y.clamp(0, frame_height.max(0));
        let x1 = self.x.saturating_add(self.width).clamp(x0, frame_width.max(x0));
        let y1 = self.y.saturating_add(self.height).clamp(y0, frame_height.max(y0));
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Center in continuous pixel coordinates
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside_frame_is_identity() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.clamp_to(320, 240), rect);
    }

    #[test]
    fn test_clamp_edges() {
        assert_eq!(Rect::new(-10, -5, 30, 20).clamp_to(320, 240), Rect::new(0, 0, 20, 15));
        assert_eq!(Rect::new(300, 230, 50, 50).clamp_to(320, 240), Rect::new(300, 230, 20, 10));
    }

    #[test]
    fn test_clamp_fully_outside_is_empty() {
        assert!(Rect::new(400, 10, 30, 30).clamp_to(320, 240).is_empty());
        assert!(Rect::new(-50, 10, 30, 30).clamp_to(320, 240).is_empty());
        assert_eq!(Rect::new(-50, 10, 30, 30).clamp_to(320, 240).area(), 0);
    }

    #[test]
    fn test_center() {
        assert_eq!(Rect::new(10, 10, 20, 40).center(), (20.0, 30.0));
    }
}
