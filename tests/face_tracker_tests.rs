//! Integration tests for the whitebalance, detection and tracking state machine


use headtrack::face_tracker::{DetectionMode, FaceTracker, FaceTrackerParams};
use headtrack::frame::RgbaFrame;
use test_helpers::{face_scene, quadrant_cascade, BACKGROUND, BLUE};

fn params(whitebalancing: bool) -> FaceTrackerParams {
    FaceTrackerParams {
        whitebalancing,
        whitebalance_window: 3,
        scale_interval: 2,
        ..FaceTrackerParams::default()
    }
}

#[test]
fn test_whitebalance_detection_tracking_sequence() {
    let mut tracker = FaceTracker::new(quadrant_cascade(), params(true));
    let scene = face_scene();
    assert_eq!(tracker.mode(), DetectionMode::Whitebalance);

    for _ in 0..3 {
        let face = tracker.track(&scene);
        assert_eq!(face.mode, DetectionMode::Whitebalance);
        assert!(!face.found);
        assert!(face.whitebalance.is_some());
    }
    assert_eq!(tracker.mode(), DetectionMode::Detection);

    let detected = tracker.track(&scene);
    assert_eq!(detected.mode, DetectionMode::Detection);
    assert!(detected.found);
    assert!(detected.confidence > -10.0);
    assert!(detected.width > 0.0);
    assert!((detected.angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert_eq!(tracker.mode(), DetectionMode::CamShift);
    assert!(tracker.camshift().is_initialized());

    let tracked = tracker.track(&scene);
    assert_eq!(tracked.mode, DetectionMode::CamShift);
    assert!(tracked.found);
    assert!((tracked.confidence - 1.0).abs() < f64::EPSILON);
    assert!(tracked.width >= 1.0 && tracked.height >= 1.0);
    assert!(tracked.elapsed_ms >= 0.0);
}

#[test]
fn test_unsteady_brightness_keeps_whitebalancing() {
    let mut tracker = FaceTracker::new(quadrant_cascade(), params(true));
    let dark = RgbaFrame::filled(64, 48, [40, 40, 40, 255]);
    let bright = RgbaFrame::filled(64, 48, [90, 90, 90, 255]);

    for i in 0..10 {
        let frame = if i % 2 == 0 { &dark } else { &bright };
        assert_eq!(tracker.track(frame).mode, DetectionMode::Whitebalance);
    }
    assert_eq!(tracker.mode(), DetectionMode::Whitebalance);
}

#[test]
fn test_empty_scene_stays_in_detection() {
    let mut tracker = FaceTracker::new(quadrant_cascade(), params(false));
    assert_eq!(tracker.mode(), DetectionMode::Detection);

    let blank = RgbaFrame::filled(160, 120, BACKGROUND);
    for _ in 0..3 {
        let face = tracker.track(&blank);
        assert_eq!(face.mode, DetectionMode::Detection);
        assert!(!face.found);
        assert!(face.confidence.abs() < f64::EPSILON);
    }
    assert_eq!(tracker.mode(), DetectionMode::Detection);
}

#[test]
fn test_threshold_blocks_weak_candidates() {
    let strict = FaceTrackerParams {
        confidence_threshold: 5.0,
        ..params(false)
    };
    let mut tracker = FaceTracker::new(quadrant_cascade(), strict);
    let face = tracker.track(&face_scene());
    assert_eq!(face.mode, DetectionMode::Detection);
    assert!(!face.found);
    // The candidate is still reported
    assert!(face.width > 0.0);
    assert_eq!(tracker.mode(), DetectionMode::Detection);
}

#[test]
fn test_lost_track_stays_in_camshift_until_reset() {
    let mut tracker = FaceTracker::new(quadrant_cascade(), params(false));
    assert!(tracker.track(&face_scene()).found);
    assert_eq!(tracker.mode(), DetectionMode::CamShift);

    let lost = tracker.track(&RgbaFrame::filled(160, 120, BLUE));
    assert_eq!(lost.mode, DetectionMode::CamShift);
    assert!(!lost.found);
    assert_eq!(tracker.mode(), DetectionMode::CamShift);

    tracker.reset_to_detection();
    assert_eq!(tracker.mode(), DetectionMode::Detection);
    assert!(tracker.track(&face_scene()).found);
    assert_eq!(tracker.mode(), DetectionMode::CamShift);
}
