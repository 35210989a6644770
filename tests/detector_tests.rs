//! Integration tests for cascade loading and multi-scale detection


use headtrack::cascade::CascadeModel;
use headtrack::detector::{detect_objects, group_rectangles, ObjectDetector};
use headtrack::frame::GrayFrame;
use headtrack::Error;
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_helpers::{fixture_cascade, fixture_path, quadrant_cascade, rejecting_cascade};

fn noise_frame(width: usize, height: usize, seed: u64) -> GrayFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width * height).map(|_| rng.gen::<u8>()).collect();
    GrayFrame::from_vec(width, height, data).unwrap()
}

#[test]
fn test_fixture_cascade_loads() {
    let cascade = fixture_cascade();
    assert_eq!((cascade.width(), cascade.height()), (24, 24));
    assert_eq!(cascade.stages().len(), 2);
    assert_eq!(cascade.features().len(), 3);
    assert_eq!(cascade.stages()[0].feature_count(), 2);
}

#[test]
fn test_invalid_fixture_is_rejected_at_load() {
    match CascadeModel::from_file(fixture_path("bad_cascade.json")) {
        Err(Error::CascadeFormat(msg)) => assert!(msg.contains("Stage 0, feature 0"), "{msg}"),
        other => panic!("Expected CascadeFormat, got {other:?}"),
    }
}

#[test]
fn test_missing_cascade_is_io_error() {
    assert!(matches!(
        CascadeModel::from_file(fixture_path("does_not_exist.json")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_first_stage_rejection_skips_later_stages() {
    let mut detector = ObjectDetector::with_params(rejecting_cascade(), 3, 1);
    let (faces, stats) = detector.detect_with_stats(&noise_frame(96, 72, 7));

    assert!(faces.is_empty());
    assert!(stats.windows_evaluated > 0);
    assert_eq!(stats.stage_features_evaluated[0], stats.windows_evaluated * 2);
    assert_eq!(stats.stage_features_evaluated[1], 0);
}

#[test]
fn test_mid_gray_frame_has_no_detections() {
    let frame = GrayFrame::filled(320, 240, 128);

    let mut detector = ObjectDetector::new(fixture_cascade());
    let (raw, stats) = detector.detect_raw(&frame);
    assert!(raw.is_empty());
    assert!(stats.windows_evaluated > 0);
    // Every feature fails on a flat frame, so stage 0 rejects everything
    assert_eq!(stats.stage_features_evaluated[1], 0);

    let threshold = fixture_cascade().stages()[0].threshold();
    assert!(detector.detect(&frame).iter().all(|d| d.confidence <= threshold));
}

#[test]
fn test_pattern_found_at_double_scale() {
    // Quadrant pattern drawn with 8x8 blocks: matches the 8x8 window at half resolution
    let mut frame = GrayFrame::filled(72, 72, 128);
    for y in 32..40 {
        for x in 32..40 {
            frame.set(x, y, 250);
        }
    }
    for y in 40..48 {
        for x in 40..48 {
            frame.set(x, y, 5);
        }
    }

    let mut detector = ObjectDetector::with_params(quadrant_cascade(), 2, 0);
    let (raw, _) = detector.detect_raw(&frame);
    assert!(
        raw.iter()
            .any(|r| (r.x - 32.0).abs() < 1e-6 && (r.y - 32.0).abs() < 1e-6 && (r.width - 16.0).abs() < 1e-6),
        "no 16px detection at (32, 32) in {raw:?}"
    );
}

#[test]
fn test_grouping_merges_overlapping_hits() {
    let mut frame = GrayFrame::filled(64, 64, 128);
    for y in 16..20 {
        for x in 16..20 {
            frame.set(x, y, 250);
        }
    }
    for y in 20..24 {
        for x in 20..24 {
            frame.set(x, y, 5);
        }
    }

    let raw = detect_objects(&frame, quadrant_cascade(), 2, 0);
    let grouped = group_rectangles(&raw, 1);
    assert!(!grouped.is_empty());
    assert!(grouped.len() <= raw.len());
    assert!(grouped.iter().all(|g| g.neighbors >= 1));
    assert!(grouped.iter().map(|g| g.neighbors).sum::<usize>() <= raw.len());

    // Requiring more neighbors than there are hits removes everything
    assert!(group_rectangles(&raw, raw.len() + 1).is_empty());
}

#[test]
fn test_detector_reuse_matches_fresh_detector() {
    let frame = noise_frame(80, 60, 3);
    let mut reused = ObjectDetector::with_params(quadrant_cascade(), 2, 0);
    let _ = reused.detect(&GrayFrame::filled(120, 90, 40));
    let (first, _) = reused.detect_raw(&frame);
    let fresh = detect_objects(&frame, quadrant_cascade(), 2, 0);
    assert_eq!(first, fresh);
}
