//! Color-histogram CAMShift tracker.
//!
//! The model histogram is sampled once from the detected face. Every frame
//! the whole-frame histogram is compared against it to back-project a
//! probability field, and mean-shift moves the search window onto the
//! densest region. The window's second-order moments then give the size and
//! orientation of the tracked object.

mod histogram;
mod moments;

pub use histogram::ColorHistogram;
pub use moments::Moments;

use crate::constants::{MEAN_SHIFT_MAX_ITERATIONS, SEARCH_WINDOW_GROWTH};
use crate::frame::{GrayFrame, RgbaFrame, RGBA_CHANNELS};
use crate::utils::safe_cast::{floor_to_i32_clamp, usize_to_i32};
use crate::utils::Rect;
use crate::{Error, Result};
use ndarray::Array2;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};

/// Tracker tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CamShiftParams {
    /// Derive orientation (and oriented size) from the mixed moment
    pub calc_angles: bool,
    pub max_iterations: usize,
    /// Search window size relative to the last tracked size
    pub window_growth: f64,
}

impl Default for CamShiftParams {
    fn default() -> Self {
        Self {
            calc_angles: true,
            max_iterations: MEAN_SHIFT_MAX_ITERATIONS,
            window_growth: SEARCH_WINDOW_GROWTH,
        }
    }
}

/// Tracked object; `x` and `y` are the center
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Orientation in `[0, PI)`
    pub angle: f64,
}

/// Why a frame produced no track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LostReason {
    NotInitialized,
    EmptyFrame,
    /// No model color inside the search window
    NoProbabilityMass,
    /// Moments gave a zero or non-finite size
    DegenerateShape,
}

/// Outcome of one tracking step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackResult {
    Tracked(TrackedRect),
    Lost(LostReason),
}

impl TrackResult {
    #[must_use]
    pub fn tracked(&self) -> Option<TrackedRect> {
        match self {
            Self::Tracked(rect) => Some(*rect),
            Self::Lost(_) => None,
        }
    }
}

/// CAMShift tracker state; one instance per tracked object
#[derive(Debug)]
pub struct CamShiftTracker {
    params: CamShiftParams,
    model: Option<ColorHistogram>,
    current: ColorHistogram,
    weights: Vec<f32>,
    pdf: Array2<f32>,
    search_window: Option<Rect>,
    track_object: Option<TrackedRect>,
}

impl Default for CamShiftTracker {
    fn default() -> Self {
        Self::new(CamShiftParams::default())
    }
}

impl CamShiftTracker {
    #[must_use]
    pub fn new(params: CamShiftParams) -> Self {
        Self {
            params,
            model: None,
            current: ColorHistogram::new(),
            weights: Vec::new(),
            pdf: Array2::zeros((0, 0)),
            search_window: None,
            track_object: None,
        }
    }

    #[must_use]
    pub fn params(&self) -> &CamShiftParams {
        &self.params
    }

    /// Sample the model histogram from `rect` and start searching there
    ///
    /// # Errors
    ///
    /// Returns an error if `rect` does not overlap the frame
    pub fn init_tracker(&mut self, frame: &RgbaFrame, rect: Rect) -> Result<()> {
        let fw = usize_to_i32(frame.width())?;
        let fh = usize_to_i32(frame.height())?;
        if rect.clamp_to(fw, fh).is_empty() {
            return Err(Error::InvalidInput(format!(
                "Tracking region {rect:?} does not overlap the {fw}x{fh} frame"
            )));
        }
        self.model = Some(ColorHistogram::from_region(frame, rect));
        self.search_window = Some(rect);
        self.track_object = None;
        log::debug!("CAMShift initialized on {rect:?}");
        Ok(())
    }

    /// Whether a model histogram has been sampled
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    /// Current search window (may extend past the frame)
    #[must_use]
    pub fn search_window(&self) -> Option<Rect> {
        self.search_window
    }

    /// Last successful track
    #[must_use]
    pub fn track_object(&self) -> Option<TrackedRect> {
        self.track_object
    }

    /// Locate the model colors in `frame`
    #[allow(clippy::cast_possible_truncation)]
    pub fn track(&mut self, frame: &RgbaFrame) -> TrackResult {
        let (Some(model), Some(mut window)) = (self.model.as_ref(), self.search_window) else {
            return TrackResult::Lost(LostReason::NotInitialized);
        };
        if frame.is_empty() {
            return TrackResult::Lost(LostReason::EmptyFrame);
        }
        let (Ok(fw), Ok(fh)) = (usize_to_i32(frame.width()), usize_to_i32(frame.height())) else {
            return TrackResult::Lost(LostReason::EmptyFrame);
        };

        self.current.fill_frame(frame);
        self.current.ratio_weights_into(model, &mut self.weights);
        self.back_project(frame);

        let Some(moments) = self.mean_shift(&mut window, fw, fh) else {
            log::debug!("CAMShift lost: no probability mass near {window:?}");
            return TrackResult::Lost(LostReason::NoProbabilityMass);
        };
        window.x = window.x.clamp(0, fw);
        window.y = window.y.clamp(0, fh);

        let (width, height, angle) = self.shape(&moments);
        if !(width.is_finite() && height.is_finite()) || width < 1.0 || height < 1.0 {
            log::debug!("CAMShift lost: degenerate shape {width}x{height}");
            return TrackResult::Lost(LostReason::DegenerateShape);
        }

        let (cx, cy) = window.center();
        let tracked = TrackedRect {
            x: cx.clamp(0.0, f64::from(fw)).floor(),
            y: cy.clamp(0.0, f64::from(fh)).floor(),
            width,
            height,
            angle,
        };

        let grown_w = floor_to_i32_clamp(width * self.params.window_growth, 1, fw.max(1) * 2);
        let grown_h = floor_to_i32_clamp(height * self.params.window_growth, 1, fh.max(1) * 2);
        let (tx, ty) = (tracked.x as i32, tracked.y as i32);
        self.search_window = Some(Rect::new(tx - grown_w / 2, ty - grown_h / 2, grown_w, grown_h));
        self.track_object = Some(tracked);
        TrackResult::Tracked(tracked)
    }

    /// Probability field of the last tracked frame as an 8-bit image
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn back_projection_image(&self) -> GrayFrame {
        let (rows, cols) = self.pdf.dim();
        let mut image = GrayFrame::new(cols, rows);
        for (value, &p) in image.data_mut().iter_mut().zip(self.pdf.iter()) {
            *value = (p * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        image
    }

    fn back_project(&mut self, frame: &RgbaFrame) {
        let dim = (frame.height(), frame.width());
        if self.pdf.dim() != dim {
            self.pdf = Array2::zeros(dim);
        }
        for (y, mut row) in self.pdf.rows_mut().into_iter().enumerate() {
            for (p, px) in row.iter_mut().zip(frame.row(y).chunks_exact(RGBA_CHANNELS)) {
                *p = self.weights[ColorHistogram::bin_index(px[0], px[1], px[2])];
            }
        }
    }

    /// Move `window` onto the centroid until it stops; returns second-order moments
    #[allow(clippy::cast_possible_truncation)]
    fn mean_shift(&self, window: &mut Rect, fw: i32, fh: i32) -> Option<Moments> {
        let iterations = self.params.max_iterations.max(1);
        for iteration in 0..iterations {
            let last = iteration + 1 == iterations;
            let clipped = window.clamp_to(fw, fh);
            let moments = Moments::compute(self.pdf.view(), clipped, last)?;

            // Recenter the full window on the absolute centroid
            let x = clipped.x + floor_to_i32_clamp((moments.xc - f64::from(window.width) / 2.0).trunc(), -fw, fw);
            let y = clipped.y + floor_to_i32_clamp((moments.yc - f64::from(window.height) / 2.0).trunc(), -fh, fh);
            let converged = x == window.x && y == window.y;
            window.x = x;
            window.y = y;

            if converged {
                log::trace!("Mean-shift converged after {} iterations", iteration + 1);
                return if moments.second_order {
                    Some(moments)
                } else {
                    Moments::compute(self.pdf.view(), clipped, true)
                };
            }
            if last {
                return Some(moments);
            }
        }
        None
    }

    /// Width, height and angle from second-order moments
    fn shape(&self, m: &Moments) -> (f64, f64, f64) {
        let a = m.mu20 / m.m00;
        let c = m.mu02 / m.m00;
        if !self.params.calc_angles {
            return ((4.0 * a.sqrt()).floor(), (4.0 * c.sqrt()).floor(), FRAC_PI_2);
        }
        let b = m.mu11 / m.m00;
        let d = a + c;
        let e = (4.0 * b * b + (a - c) * (a - c)).sqrt();
        let width = (4.0 * ((d - e) / 2.0).max(0.0).sqrt()).floor();
        let height = (4.0 * ((d + e) / 2.0).max(0.0).sqrt()).floor();
        // atan2 yields (-PI, PI]; fold into [0, PI)
        let angle = (2.0 * b).atan2(a - c + e).rem_euclid(PI);
        (width, height, angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIN: [u8; 4] = [220, 160, 120, 255];
    const BACKGROUND: [u8; 4] = [20, 60, 20, 255];

    fn frame_with_blob(x: usize, y: usize, w: usize, h: usize) -> RgbaFrame {
        let mut frame = RgbaFrame::filled(160, 120, BACKGROUND);
        frame.fill_rect(x, y, w, h, SKIN);
        frame
    }

    #[test]
    fn test_track_before_init_is_lost() {
        let mut tracker = CamShiftTracker::default();
        let frame = frame_with_blob(10, 10, 20, 20);
        assert_eq!(tracker.track(&frame), TrackResult::Lost(LostReason::NotInitialized));
        assert!(!tracker.is_initialized());
    }

    #[test]
    fn test_init_outside_frame_fails() {
        let mut tracker = CamShiftTracker::default();
        let frame = frame_with_blob(10, 10, 20, 20);
        assert!(tracker.init_tracker(&frame, Rect::new(200, 200, 10, 10)).is_err());
    }

    #[test]
    fn test_follows_moving_blob() {
        let mut tracker = CamShiftTracker::default();
        tracker
            .init_tracker(&frame_with_blob(40, 30, 24, 32), Rect::new(40, 30, 24, 32))
            .unwrap();

        let tracked = tracker.track(&frame_with_blob(46, 34, 24, 32)).tracked().unwrap();
        // Mean-shift stops once the centroid is less than a pixel from the window center
        assert!((tracked.x - 58.0).abs() <= 3.0, "x = {}", tracked.x);
        assert!((tracked.y - 50.0).abs() <= 3.0, "y = {}", tracked.y);
        assert!(tracked.height >= tracked.width);
        assert!((0.0..PI).contains(&tracked.angle));
    }

    #[test]
    fn test_blob_disappearing_is_lost() {
        let mut tracker = CamShiftTracker::default();
        tracker
            .init_tracker(&frame_with_blob(40, 30, 24, 32), Rect::new(40, 30, 24, 32))
            .unwrap();
        let empty = RgbaFrame::filled(160, 120, BACKGROUND);
        // The model holds only skin, so the background gets zero weight
        assert_eq!(tracker.track(&empty), TrackResult::Lost(LostReason::NoProbabilityMass));
    }

    #[test]
    fn test_empty_frame_is_lost() {
        let mut tracker = CamShiftTracker::default();
        tracker
            .init_tracker(&frame_with_blob(40, 30, 24, 32), Rect::new(40, 30, 24, 32))
            .unwrap();
        let empty = RgbaFrame::filled(0, 0, SKIN);
        assert_eq!(tracker.track(&empty), TrackResult::Lost(LostReason::EmptyFrame));
    }

    #[test]
    fn test_without_angles_is_upright() {
        let mut tracker = CamShiftTracker::new(CamShiftParams {
            calc_angles: false,
            ..CamShiftParams::default()
        });
        let frame = frame_with_blob(40, 30, 24, 32);
        tracker.init_tracker(&frame, Rect::new(40, 30, 24, 32)).unwrap();
        let tracked = tracker.track(&frame).tracked().unwrap();
        assert!((tracked.angle - FRAC_PI_2).abs() < 1e-12);
        // 4 * sqrt((24^2 - 1) / 12)
        assert!((tracked.width - 27.0).abs() <= 1.0);
        assert!((tracked.height - 36.0).abs() <= 1.0);
    }

    #[test]
    fn test_back_projection_image() {
        let mut tracker = CamShiftTracker::default();
        let frame = frame_with_blob(40, 30, 24, 32);
        tracker.init_tracker(&frame, Rect::new(40, 30, 24, 32)).unwrap();
        let _ = tracker.track(&frame);

        let image = tracker.back_projection_image();
        assert_eq!((image.width(), image.height()), (160, 120));
        assert_eq!(image.get(50, 40), 255);
        assert_eq!(image.get(5, 5), 0);
    }

    #[test]
    fn test_search_window_grows_around_center() {
        let mut tracker = CamShiftTracker::default();
        let frame = frame_with_blob(40, 30, 24, 32);
        tracker.init_tracker(&frame, Rect::new(40, 30, 24, 32)).unwrap();
        let tracked = tracker.track(&frame).tracked().unwrap();
        let window = tracker.search_window().unwrap();

        assert_eq!(window.width, (tracked.width * 1.1).floor() as i32);
        assert!((f64::from(window.x) + f64::from(window.width) / 2.0 - tracked.x).abs() <= 1.0);
        assert_eq!(tracker.track_object(), Some(tracked));
    }
}
