//! Quantized RGB color histogram.

use crate::constants::{HISTOGRAM_BINS, HISTOGRAM_LEVELS, HISTOGRAM_SHIFT};
use crate::frame::{RgbaFrame, RGBA_CHANNELS};
use crate::utils::safe_cast::i32_to_usize_clamp;
use crate::utils::Rect;

/// Pixel counts over 16 levels per color channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorHistogram {
    bins: Vec<u32>,
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self {
            bins: vec![0; HISTOGRAM_BINS],
        }
    }
}

impl ColorHistogram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Histogram of the pixels inside `rect`, clipped to the frame
    #[must_use]
    pub fn from_region(frame: &RgbaFrame, rect: Rect) -> Self {
        let mut histogram = Self::new();
        histogram.fill_region(frame, rect);
        histogram
    }

    /// Histogram of the whole frame
    #[must_use]
    pub fn from_frame(frame: &RgbaFrame) -> Self {
        let mut histogram = Self::new();
        histogram.fill_frame(frame);
        histogram
    }

    /// Bin of an RGB triple
    #[must_use]
    pub fn bin_index(r: u8, g: u8, b: u8) -> usize {
        let (r, g, b) = (
            usize::from(r >> HISTOGRAM_SHIFT),
            usize::from(g >> HISTOGRAM_SHIFT),
            usize::from(b >> HISTOGRAM_SHIFT),
        );
        (r * HISTOGRAM_LEVELS + g) * HISTOGRAM_LEVELS + b
    }

    /// Reset and count the pixels inside `rect`
    pub fn fill_region(&mut self, frame: &RgbaFrame, rect: Rect) {
        self.bins.fill(0);
        let Some((x0, y0, x1, y1)) = clipped_bounds(frame, rect) else {
            return;
        };
        for y in y0..y1 {
            let row = &frame.row(y)[x0 * RGBA_CHANNELS..x1 * RGBA_CHANNELS];
            for px in row.chunks_exact(RGBA_CHANNELS) {
                self.bins[Self::bin_index(px[0], px[1], px[2])] += 1;
            }
        }
    }

    /// Reset and count every pixel of the frame
    pub fn fill_frame(&mut self, frame: &RgbaFrame) {
        self.bins.fill(0);
        for y in 0..frame.height() {
            for px in frame.row(y).chunks_exact(RGBA_CHANNELS) {
                self.bins[Self::bin_index(px[0], px[1], px[2])] += 1;
            }
        }
    }

    #[must_use]
    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    #[must_use]
    pub fn get(&self, bin: usize) -> u32 {
        self.bins[bin]
    }

    /// Number of counted pixels
    #[must_use]
    pub fn total(&self) -> u64 {
        self.bins.iter().map(|&count| u64::from(count)).sum()
    }

    /// Per-bin back-projection weights `min(model / self, 1)`
    ///
    /// Bins absent from `self` get weight 0.
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio_weights_into(&self, model: &Self, weights: &mut Vec<f32>) {
        weights.clear();
        weights.extend(self.bins.iter().zip(&model.bins).map(|(&current, &wanted)| {
            if current == 0 {
                0.0
            } else {
                (wanted as f32 / current as f32).min(1.0)
            }
        }));
    }
}

/// Rectangle clipped to the frame as `(x0, y0, x1, y1)` buffer bounds
fn clipped_bounds(frame: &RgbaFrame, rect: Rect) -> Option<(usize, usize, usize, usize)> {
    let fw = i32::try_from(frame.width()).unwrap_or(i32::MAX);
    let fh = i32::try_from(frame.height()).unwrap_or(i32::MAX);
    let clipped = rect.clamp_to(fw, fh);
    if clipped.is_empty() {
        return None;
    }
    Some((
        i32_to_usize_clamp(clipped.x, frame.width()),
        i32_to_usize_clamp(clipped.y, frame.height()),
        i32_to_usize_clamp(clipped.x + clipped.width, frame.width()),
        i32_to_usize_clamp(clipped.y + clipped.height, frame.height()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bin_index_layout() {
        assert_eq!(ColorHistogram::bin_index(0, 0, 0), 0);
        assert_eq!(ColorHistogram::bin_index(255, 255, 255), HISTOGRAM_BINS - 1);
        assert_eq!(ColorHistogram::bin_index(16, 0, 0), 256);
        assert_eq!(ColorHistogram::bin_index(0, 16, 0), 16);
        assert_eq!(ColorHistogram::bin_index(0, 0, 31), 1);
    }

    #[test]
    fn test_uniform_frames_fill_one_bin() {
        let black = ColorHistogram::from_frame(&RgbaFrame::filled(10, 7, [0, 0, 0, 255]));
        assert_eq!(black.get(0), 70);
        assert_eq!(black.total(), 70);

        let white = ColorHistogram::from_frame(&RgbaFrame::filled(10, 7, [255, 255, 255, 255]));
        assert_eq!(white.get(HISTOGRAM_BINS - 1), 70);
    }

    #[test]
    fn test_region_is_clipped() {
        let frame = RgbaFrame::filled(20, 10, [100, 50, 25, 255]);
        assert_eq!(ColorHistogram::from_region(&frame, Rect::new(15, 5, 10, 10)).total(), 25);
        assert_eq!(ColorHistogram::from_region(&frame, Rect::new(30, 0, 5, 5)).total(), 0);
        assert_eq!(ColorHistogram::from_region(&frame, Rect::new(-5, -5, 10, 10)).total(), 25);
    }

    #[test]
    fn test_ratio_weights() {
        let mut frame = RgbaFrame::filled(4, 4, [0, 0, 0, 255]);
        frame.fill_rect(0, 0, 2, 2, [255, 0, 0, 255]);
        let model = ColorHistogram::from_region(&frame, Rect::new(0, 0, 3, 3));
        let current = ColorHistogram::from_frame(&frame);

        let mut weights = Vec::new();
        current.ratio_weights_into(&model, &mut weights);
        assert_eq!(weights.len(), HISTOGRAM_BINS);
        let red = ColorHistogram::bin_index(255, 0, 0);
        // model: 4 red, 5 black; frame: 4 red, 12 black
        assert!((weights[red] - 1.0).abs() < 1e-6);
        assert!((weights[0] - 5.0 / 12.0).abs() < 1e-6);
        assert_eq!(weights[1], 0.0);
    }

    proptest! {
        #[test]
        fn prop_region_counts_every_pixel(
            pixels in prop::collection::vec(any::<u8>(), 12 * 9 * 4),
            x in -4i32..14, y in -4i32..11, w in 0i32..16, h in 0i32..16,
        ) {
            let frame = RgbaFrame::new(12, 9, pixels).unwrap();
            let rect = Rect::new(x, y, w, h);
            let expected = rect.clamp_to(12, 9).area();
            let histogram = ColorHistogram::from_region(&frame, rect);
            prop_assert_eq!(histogram.total(), u64::try_from(expected).unwrap());
        }
    }
}
