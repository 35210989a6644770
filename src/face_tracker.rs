//! Whitebalance, detection and tracking state machine.
//!
//! A tracker starts by waiting for the camera's brightness to settle (`WB`),
//! then runs the cascade detector on every frame (`VJ`) until a confident
//! face is found, and from then on follows it with CAMShift (`CS`). Nothing
//! inside the machine moves it backwards; callers use
//! [`FaceTracker::reset_to_detection`] after a lost track.

use crate::camshift::{CamShiftParams, CamShiftTracker, TrackResult};
use crate::cascade::CascadeModel;
use crate::constants::{
    CAMSHIFT_CONFIDENCE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_INTERVAL,
    DEFAULT_WHITEBALANCE_TOLERANCE, DEFAULT_WHITEBALANCE_WINDOW,
};
use crate::detector::{DetectionRect, ObjectDetector};
use crate::frame::{GrayFrame, RgbaFrame};
use crate::stability::StabilityWindow;
use crate::utils::safe_cast::floor_to_i32_clamp;
use crate::utils::Rect;
use nalgebra::Vector5;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::Instant;

/// Tracker state that produced a [`TrackedFace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMode {
    /// Waiting for the camera whitebalance to settle
    #[serde(rename = "WB")]
    Whitebalance,
    /// Running the cascade detector
    #[serde(rename = "VJ")]
    Detection,
    /// Following the face with CAMShift
    #[serde(rename = "CS")]
    CamShift,
}

/// Per-frame face snapshot; `x` and `y` are the center of the face
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedFace {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub confidence: f64,
    pub mode: DetectionMode,
    /// Wall-clock time spent producing this snapshot
    pub elapsed_ms: f64,
    /// Whether the snapshot carries a usable face
    pub found: bool,
    /// Average gray level, reported while whitebalancing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitebalance: Option<f64>,
}

impl TrackedFace {
    fn empty(mode: DetectionMode) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            angle: FRAC_PI_2,
            confidence: 0.0,
            mode,
            elapsed_ms: 0.0,
            found: false,
            whitebalance: None,
        }
    }

    /// Geometry as `[x, y, z, width, height]` with `z` unused (0).
    ///
    /// The angle wraps at π and is left out.
    #[must_use]
    pub fn to_vector(&self) -> Vector5<f64> {
        Vector5::new(self.x, self.y, 0.0, self.width, self.height)
    }

    /// Copy with position and size taken from `[x, y, z, width, height]`; angle is kept
    #[must_use]
    pub fn with_geometry(&self, v: &Vector5<f64>) -> Self {
        Self {
            x: v[0],
            y: v[1],
            width: v[3],
            height: v[4],
            ..*self
        }
    }
}

/// State machine tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceTrackerParams {
    pub whitebalancing: bool,
    pub whitebalance_window: usize,
    pub whitebalance_tolerance: f64,
    /// Detections must score above this to start tracking
    pub confidence_threshold: f64,
    pub scale_interval: usize,
    pub min_neighbors: usize,
    pub camshift: CamShiftParams,
}

impl Default for FaceTrackerParams {
    fn default() -> Self {
        Self {
            whitebalancing: true,
            whitebalance_window: DEFAULT_WHITEBALANCE_WINDOW,
            whitebalance_tolerance: DEFAULT_WHITEBALANCE_TOLERANCE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            scale_interval: DEFAULT_SCALE_INTERVAL,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            camshift: CamShiftParams::default(),
        }
    }
}

/// Face tracking state machine
#[derive(Debug)]
pub struct FaceTracker {
    params: FaceTrackerParams,
    mode: DetectionMode,
    detector: ObjectDetector,
    camshift: CamShiftTracker,
    whitebalance: StabilityWindow,
    gray: GrayFrame,
}

impl FaceTracker {
    #[must_use]
    pub fn new(cascade: Arc<CascadeModel>, params: FaceTrackerParams) -> Self {
        let mode = if params.whitebalancing {
            DetectionMode::Whitebalance
        } else {
            DetectionMode::Detection
        };
        log::info!("Face tracker starting in {mode:?} mode");
        Self {
            detector: ObjectDetector::with_params(cascade, params.scale_interval, params.min_neighbors),
            camshift: CamShiftTracker::new(params.camshift),
            whitebalance: StabilityWindow::new(params.whitebalance_window),
            gray: GrayFrame::default(),
            params,
            mode,
        }
    }

    #[must_use]
    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    #[must_use]
    pub fn params(&self) -> &FaceTrackerParams {
        &self.params
    }

    #[must_use]
    pub fn camshift(&self) -> &CamShiftTracker {
        &self.camshift
    }

    /// Process one frame in the current mode
    pub fn track(&mut self, frame: &RgbaFrame) -> TrackedFace {
        let start = Instant::now();
        let mut face = match self.mode {
            DetectionMode::Whitebalance => self.check_whitebalance(frame),
            DetectionMode::Detection => self.detect(frame),
            DetectionMode::CamShift => self.follow(frame),
        };
        face.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        face
    }

    /// Drop the current track and detect again on the next frame
    pub fn reset_to_detection(&mut self) {
        log::info!("Returning to detection from {:?}", self.mode);
        self.mode = DetectionMode::Detection;
    }

    fn check_whitebalance(&mut self, frame: &RgbaFrame) -> TrackedFace {
        let gray = frame.average_gray();
        self.whitebalance.push(gray);
        if self.whitebalance.is_stable(self.params.whitebalance_tolerance) {
            log::info!("Whitebalance settled at {gray:.1}, starting detection");
            self.mode = DetectionMode::Detection;
        }
        TrackedFace {
            whitebalance: Some(gray),
            ..TrackedFace::empty(DetectionMode::Whitebalance)
        }
    }

    fn detect(&mut self, frame: &RgbaFrame) -> TrackedFace {
        frame.to_gray_into(&mut self.gray);
        let candidates = self.detector.detect(&self.gray);
        log::debug!("Detector returned {} candidates", candidates.len());

        let Some(best) = best_candidate(&candidates) else {
            return TrackedFace::empty(DetectionMode::Detection);
        };

        let mut face = TrackedFace {
            x: best.x + best.width / 2.0,
            y: best.y + best.height / 2.0,
            width: best.width,
            height: best.height,
            confidence: best.confidence,
            ..TrackedFace::empty(DetectionMode::Detection)
        };
        if best.confidence <= self.params.confidence_threshold {
            return face;
        }

        let rect = Rect::new(
            floor_to_i32_clamp(best.x, i32::MIN, i32::MAX),
            floor_to_i32_clamp(best.y, i32::MIN, i32::MAX),
            floor_to_i32_clamp(best.width, 0, i32::MAX),
            floor_to_i32_clamp(best.height, 0, i32::MAX),
        );
        match self.camshift.init_tracker(frame, rect) {
            Ok(()) => {
                log::info!(
                    "Face found at {rect:?} (confidence {:.2}), switching to CAMShift",
                    best.confidence
                );
                self.mode = DetectionMode::CamShift;
                face.found = true;
            }
            Err(e) => log::warn!("Could not start tracking: {e}"),
        }
        face
    }

    fn follow(&mut self, frame: &RgbaFrame) -> TrackedFace {
        match self.camshift.track(frame) {
            TrackResult::Tracked(rect) => TrackedFace {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                angle: rect.angle,
                confidence: CAMSHIFT_CONFIDENCE,
                found: true,
                ..TrackedFace::empty(DetectionMode::CamShift)
            },
            TrackResult::Lost(reason) => {
                log::warn!("Face track lost: {reason:?}");
                TrackedFace::empty(DetectionMode::CamShift)
            }
        }
    }
}

/// Highest confidence; the earliest candidate wins ties
fn best_candidate(candidates: &[DetectionRect]) -> Option<&DetectionRect> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(current) if current.confidence >= candidate.confidence => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f64, confidence: f64) -> DetectionRect {
        DetectionRect {
            x,
            y: 0.0,
            width: 24.0,
            height: 24.0,
            confidence,
            neighbors: 1,
        }
    }

    #[test]
    fn test_best_candidate_first_wins_ties() {
        let candidates = [candidate(1.0, 0.5), candidate(2.0, 2.0), candidate(3.0, 2.0)];
        assert_eq!(best_candidate(&candidates).unwrap().x, 2.0);
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn test_mode_serializes_to_short_tags() {
        assert_eq!(serde_json::to_string(&DetectionMode::Whitebalance).unwrap(), "\"WB\"");
        assert_eq!(serde_json::to_string(&DetectionMode::Detection).unwrap(), "\"VJ\"");
        assert_eq!(serde_json::to_string(&DetectionMode::CamShift).unwrap(), "\"CS\"");
    }

    #[test]
    fn test_geometry_vector_round_trip() {
        let face = TrackedFace {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            angle: 0.5,
            ..TrackedFace::empty(DetectionMode::CamShift)
        };
        assert_eq!(face.to_vector()[2], 0.0);
        let moved = face.with_geometry(&(face.to_vector() * 2.0));
        assert_eq!(moved.x, 2.0);
        assert_eq!(moved.width, 6.0);
        assert_eq!(moved.height, 8.0);
        assert_eq!(moved.angle, 0.5);
        assert_eq!(moved.mode, DetectionMode::CamShift);
    }
}
