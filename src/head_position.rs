//! Pinhole-camera estimate of the head position relative to the screen.
//!
//! The head is assumed to be 16 x 19 cm. Its pixel diagonal and the camera's
//! horizontal field of view give the distance; the offset of the face from
//! the frame center then gives the lateral position. When no field of view
//! is configured it is calibrated once from the first stable face, assuming
//! the user sits at a known distance.
//!
//! All outputs are in centimeters: `x` grows to the viewer's left, `y`
//! upwards, both relative to the screen center; `z` is the distance.

use crate::constants::{
    DEFAULT_CAMERA_TO_SCREEN_OFFSET_CM, DEFAULT_DISTANCE_TO_SCREEN_CM, EDGE_CORRECTION_MARGIN_PX, HEAD_HEIGHT_CM,
    HEAD_WIDTH_CM,
};
use crate::face_tracker::TrackedFace;
use crate::{Error, Result};
use serde::Serialize;

/// Estimator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPositionParams {
    /// Horizontal field of view; estimated from the first face when `None`
    pub fov_degrees: Option<f64>,
    /// Assumed user distance during calibration
    pub distance_to_screen_cm: f64,
    /// Vertical distance from the camera down to the screen center
    pub camera_to_screen_offset_cm: f64,
    pub edge_correction: bool,
}

impl Default for HeadPositionParams {
    fn default() -> Self {
        Self {
            fov_degrees: None,
            distance_to_screen_cm: DEFAULT_DISTANCE_TO_SCREEN_CM,
            camera_to_screen_offset_cm: DEFAULT_CAMERA_TO_SCREEN_OFFSET_CM,
            edge_correction: true,
        }
    }
}

/// Head position in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Converts tracked faces into head positions for one camera
#[derive(Debug, Clone)]
pub struct HeadPositionEstimator {
    params: HeadPositionParams,
    cam_width: f64,
    cam_height: f64,
    fov_width: f64,
    tan_fov_width: f64,
    head_diag_cm: f64,
    head_small_angle: f64,
    head_diag_px: f64,
}

impl HeadPositionEstimator {
    /// Calibrate on a stable face in a `cam_width` x `cam_height` camera
    ///
    /// # Errors
    ///
    /// Returns an error for non-positive camera dimensions, an invalid field
    /// of view or distance, or (when calibrating) a face without area
    #[allow(clippy::cast_precision_loss)]
    pub fn new(initial: &TrackedFace, cam_width: usize, cam_height: usize, params: HeadPositionParams) -> Result<Self> {
        if cam_width == 0 || cam_height == 0 {
            return Err(Error::InvalidInput(format!(
                "Camera dimensions must be positive, got {cam_width}x{cam_height}"
            )));
        }
        let (cam_width, cam_height) = (cam_width as f64, cam_height as f64);
        let head_small_angle = (HEAD_WIDTH_CM / HEAD_HEIGHT_CM).atan();
        let head_diag_cm = HEAD_WIDTH_CM.hypot(HEAD_HEIGHT_CM);
        let head_diag_px = initial.width.hypot(initial.height);

        let fov_width = if let Some(fov) = params.fov_degrees {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(Error::InvalidInput(format!("Field of view must be in (0, 180), got {fov}")));
            }
            fov.to_radians()
        } else {
            if !(initial.width > 0.0 && initial.height > 0.0 && head_diag_px.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "Cannot calibrate on a {}x{} face",
                    initial.width, initial.height
                )));
            }
            if !(params.distance_to_screen_cm > 0.0 && params.distance_to_screen_cm.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "Distance to screen must be positive, got {}",
                    params.distance_to_screen_cm
                )));
            }
            let head_width_px = head_small_angle.sin() * head_diag_px;
            let cam_width_cm = cam_width / head_width_px * HEAD_WIDTH_CM;
            2.0 * (cam_width_cm / 2.0 / params.distance_to_screen_cm).atan()
        };

        log::info!(
            "Head position estimator ready: {cam_width}x{cam_height} camera, FOV {:.1} degrees",
            fov_width.to_degrees()
        );
        Ok(Self {
            params,
            cam_width,
            cam_height,
            fov_width,
            tan_fov_width: 2.0 * (fov_width / 2.0).tan(),
            head_diag_cm,
            head_small_angle,
            head_diag_px,
        })
    }

    /// Horizontal field of view in degrees
    #[must_use]
    pub fn fov_degrees(&self) -> f64 {
        self.fov_width.to_degrees()
    }

    #[must_use]
    pub fn fov_radians(&self) -> f64 {
        self.fov_width
    }

    #[must_use]
    pub fn params(&self) -> &HeadPositionParams {
        &self.params
    }

    /// Head position for one tracked face; `None` for faces without area
    pub fn track(&mut self, face: &TrackedFace) -> Option<HeadPosition> {
        let (w, h) = (face.width, face.height);
        if !(w > 0.0 && h > 0.0 && face.x.is_finite() && face.y.is_finite()) {
            return None;
        }
        let (mut fx, mut fy) = (face.x, face.y);

        if self.params.edge_correction {
            (fx, fy) = self.correct_edges(fx, fy, w, h);
        } else {
            self.head_diag_px = w.hypot(h);
        }

        let z = self.head_diag_cm * self.cam_width / (self.tan_fov_width * self.head_diag_px);
        let x = -((fx / self.cam_width) - 0.5) * z * self.tan_fov_width;
        let y = -((fy / self.cam_height) - 0.5) * z * self.tan_fov_width * (self.cam_height / self.cam_width)
            + self.params.camera_to_screen_offset_cm;

        log::trace!("Head at ({x:.1}, {y:.1}, {z:.1}) cm");
        Some(HeadPosition { x, y, z })
    }

    /// Compensate faces cut off by the frame border
    ///
    /// The visible axis and the known head proportions reconstruct the
    /// clipped one, blended in linearly as the face approaches the edge. In
    /// a corner nothing reliable remains, so the previous diagonal is kept.
    fn correct_edges(&mut self, fx: f64, fy: f64, w: f64, h: f64) -> (f64, f64) {
        let margin = EDGE_CORRECTION_MARGIN_PX;
        let (sin, cos, tan) = (
            self.head_small_angle.sin(),
            self.head_small_angle.cos(),
            self.head_small_angle.tan(),
        );
        let left = (fx - w / 2.0).max(0.0);
        let right = (self.cam_width - (fx + w / 2.0)).max(0.0);
        let top = (fy - h / 2.0).max(0.0);
        let bottom = (self.cam_height - (fy + h / 2.0)).max(0.0);

        let on_vertical_edge = left < margin || right < margin;
        let on_horizontal_edge = top < margin || bottom < margin;
        let raw_diag = w.hypot(h);

        if on_horizontal_edge && on_vertical_edge {
            let diag = self.head_diag_px;
            let x = if left < margin {
                w - diag * sin / 2.0
            } else {
                fx - w / 2.0 + diag * sin / 2.0
            };
            let y = if top < margin {
                h - diag * cos / 2.0
            } else {
                fy - h / 2.0 + diag * cos / 2.0
            };
            (x, y)
        } else if on_horizontal_edge {
            let distance = if top < margin { top } else { bottom };
            let measured = distance / margin;
            let estimate = (margin - distance) / margin;
            let half_height = measured * (h / 2.0) + estimate * ((w / tan) / 2.0);
            self.head_diag_px = estimate * (w / sin) + measured * raw_diag;
            let y = if top < margin { h - half_height } else { fy - h / 2.0 + half_height };
            (fx, y)
        } else if on_vertical_edge {
            let distance = if left < margin { left } else { right };
            let measured = distance / margin;
            let estimate = (margin - distance) / margin;
            let half_width = measured * (w / 2.0) + estimate * (h * tan / 2.0);
            self.head_diag_px = estimate * (h / cos) + measured * raw_diag;
            let x = if left < margin { w - half_width } else { fx - w / 2.0 + half_width };
            (x, fy)
        } else {
            self.head_diag_px = raw_diag;
            (fx, fy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_tracker::DetectionMode;

    fn face(x: f64, y: f64, width: f64, height: f64) -> TrackedFace {
        TrackedFace {
            x,
            y,
            width,
            height,
            angle: std::f64::consts::FRAC_PI_2,
            confidence: 1.0,
            mode: DetectionMode::CamShift,
            elapsed_ms: 0.0,
            found: true,
            whitebalance: None,
        }
    }

    fn estimator(params: HeadPositionParams) -> HeadPositionEstimator {
        HeadPositionEstimator::new(&face(160.0, 120.0, 64.0, 76.0), 320, 240, params).unwrap()
    }

    #[test]
    fn test_calibration_face_is_at_assumed_distance() {
        let mut est = estimator(HeadPositionParams::default());
        let pos = est.track(&face(160.0, 120.0, 64.0, 76.0)).unwrap();
        assert!((pos.z - 60.0).abs() < 1e-6, "z = {}", pos.z);
        assert!(pos.x.abs() < 1e-9);
        assert!((pos.y - 11.5).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_fov() {
        let est = estimator(HeadPositionParams {
            fov_degrees: Some(60.0),
            ..HeadPositionParams::default()
        });
        assert!((est.fov_degrees() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_lateral_sign_convention() {
        let mut est = estimator(HeadPositionParams {
            edge_correction: false,
            ..HeadPositionParams::default()
        });
        // Face left of center in the image, above center
        let pos = est.track(&face(100.0, 80.0, 64.0, 76.0)).unwrap();
        assert!(pos.x > 0.0);
        assert!(pos.y > 11.5);
    }

    #[test]
    fn test_larger_face_is_closer() {
        let mut est = estimator(HeadPositionParams::default());
        let far = est.track(&face(160.0, 120.0, 50.0, 60.0)).unwrap();
        let near = est.track(&face(160.0, 120.0, 80.0, 95.0)).unwrap();
        assert!(near.z < far.z);
    }

    #[test]
    fn test_invalid_construction() {
        let f = face(160.0, 120.0, 64.0, 76.0);
        let params = HeadPositionParams::default();
        assert!(HeadPositionEstimator::new(&f, 0, 240, params).is_err());
        assert!(HeadPositionEstimator::new(&face(0.0, 0.0, 0.0, 0.0), 320, 240, params).is_err());
        let bad_fov = HeadPositionParams {
            fov_degrees: Some(0.0),
            ..params
        };
        assert!(HeadPositionEstimator::new(&f, 320, 240, bad_fov).is_err());
        let bad_distance = HeadPositionParams {
            distance_to_screen_cm: -1.0,
            ..params
        };
        assert!(HeadPositionEstimator::new(&f, 320, 240, bad_distance).is_err());
    }

    #[test]
    fn test_degenerate_face_has_no_position() {
        let mut est = estimator(HeadPositionParams::default());
        assert!(est.track(&face(160.0, 120.0, 0.0, 76.0)).is_none());
        assert!(est.track(&face(f64::NAN, 120.0, 64.0, 76.0)).is_none());
    }

    #[test]
    fn test_top_edge_uses_width_for_distance() {
        let mut est = estimator(HeadPositionParams::default());
        let centered = est.track(&face(160.0, 120.0, 64.0, 76.0)).unwrap();
        // Same width, top of the head cut off by the frame
        let clipped = est.track(&face(160.0, 25.0, 64.0, 50.0)).unwrap();
        assert!((clipped.z - centered.z).abs() < 1e-6, "{} vs {}", clipped.z, centered.z);
    }

    #[test]
    fn test_corner_keeps_previous_distance() {
        let mut est = estimator(HeadPositionParams::default());
        let before = est.track(&face(160.0, 120.0, 64.0, 76.0)).unwrap();
        let corner = est.track(&face(15.0, 20.0, 30.0, 40.0)).unwrap();
        assert!((corner.z - before.z).abs() < 1e-9);
    }
}
