//! Image moments over a window of a probability field.

use crate::constants::EPSILON;
use crate::utils::safe_cast::i32_to_usize_clamp;
use crate::utils::Rect;
use ndarray::{s, ArrayView2};

/// Raw and central moments, in coordinates relative to the window origin
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m20: f64,
    pub m02: f64,
    /// Centroid column
    pub xc: f64,
    /// Centroid row
    pub yc: f64,
    pub mu20: f64,
    pub mu02: f64,
    pub mu11: f64,
    /// Whether the second-order terms were accumulated
    pub second_order: bool,
}

impl Moments {
    /// Moments of `pdf` (indexed `[row, column]`) inside `window`
    ///
    /// The window is clipped to the field. Returns `None` when the clipped
    /// window is empty or carries no probability mass.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(pdf: ArrayView2<f32>, window: Rect, second_order: bool) -> Option<Self> {
        let (rows, cols) = pdf.dim();
        let clipped = window.clamp_to(
            i32::try_from(cols).unwrap_or(i32::MAX),
            i32::try_from(rows).unwrap_or(i32::MAX),
        );
        if clipped.is_empty() {
            return None;
        }
        let x0 = i32_to_usize_clamp(clipped.x, cols);
        let y0 = i32_to_usize_clamp(clipped.y, rows);
        let x1 = i32_to_usize_clamp(clipped.x + clipped.width, cols);
        let y1 = i32_to_usize_clamp(clipped.y + clipped.height, rows);
        let region = pdf.slice(s![y0..y1, x0..x1]);

        let mut m = Self {
            second_order,
            ..Self::default()
        };
        for ((row, col), &value) in region.indexed_iter() {
            let v = f64::from(value);
            let (x, y) = (col as f64, row as f64);
            m.m00 += v;
            m.m10 += x * v;
            m.m01 += y * v;
            if second_order {
                m.m11 += x * y * v;
                m.m20 += x * x * v;
                m.m02 += y * y * v;
            }
        }

        if m.m00 <= EPSILON {
            return None;
        }
        m.xc = m.m10 / m.m00;
        m.yc = m.m01 / m.m00;
        if second_order {
            m.mu20 = m.m20 - m.m10 * m.xc;
            m.mu02 = m.m02 - m.m01 * m.yc;
            m.mu11 = m.m11 - m.m01 * m.xc;
        }
        Some(m)
    }
}
