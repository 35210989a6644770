//! Boosted brightness-feature cascade detector.
//!
//! A sliding window of the cascade's size is evaluated on three pyramid
//! levels at once (full, half and quarter resolution relative to the
//! window), one octave after another. A window survives a stage when the
//! summed feature contributions reach the stage threshold; windows that pass
//! every stage become raw detections, which are then grouped.

mod grouping;
mod pyramid;

pub use grouping::{array_group, group_rectangles, is_neighbor};
pub use pyramid::{Pyramid, VARIANT_OFFSETS};

use crate::cascade::{CascadeModel, Sample, SamplePair, SAMPLE_LEVELS};
use crate::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_INTERVAL};
use crate::frame::GrayFrame;
use serde::Serialize;
use std::sync::Arc;

/// Detection in source frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Sum of the last stage; higher is more face-like
    pub confidence: f64,
    /// Number of raw windows merged into this detection
    pub neighbors: usize,
}

/// Per-call counters, useful to check that the cascade short-circuits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub windows_evaluated: u64,
    pub raw_detections: u64,
    /// Features evaluated in each stage, summed over all windows
    pub stage_features_evaluated: Vec<u64>,
}

/// Sample pair resolved to buffer offsets for one octave
#[derive(Debug, Clone, Copy, Default)]
struct PairOffsets {
    positive: Option<(usize, usize)>,
    negative: Option<(usize, usize)>,
}

/// Cascade detector with reusable pyramid buffers
///
/// The model is shared; one detector per thread.
#[derive(Debug)]
pub struct ObjectDetector {
    cascade: Arc<CascadeModel>,
    scale_interval: usize,
    min_neighbors: usize,
    pyramid: Pyramid,
    offsets: Vec<PairOffsets>,
}

impl ObjectDetector {
    #[must_use]
    pub fn new(cascade: Arc<CascadeModel>) -> Self {
        Self::with_params(cascade, DEFAULT_SCALE_INTERVAL, DEFAULT_MIN_NEIGHBORS)
    }

    /// Detector with explicit pyramid density and grouping threshold
    #[must_use]
    pub fn with_params(cascade: Arc<CascadeModel>, scale_interval: usize, min_neighbors: usize) -> Self {
        let pairs = cascade.sample_pairs().len();
        Self {
            cascade,
            scale_interval,
            min_neighbors,
            pyramid: Pyramid::new(),
            offsets: vec![PairOffsets::default(); pairs],
        }
    }

    #[must_use]
    pub fn cascade(&self) -> &Arc<CascadeModel> {
        &self.cascade
    }

    #[must_use]
    pub fn scale_interval(&self) -> usize {
        self.scale_interval
    }

    #[must_use]
    pub fn min_neighbors(&self) -> usize {
        self.min_neighbors
    }

    /// Grouped detections, in no particular order
    pub fn detect(&mut self, frame: &GrayFrame) -> Vec<DetectionRect> {
        self.detect_with_stats(frame).0
    }

    /// Grouped detections together with evaluation counters
    pub fn detect_with_stats(&mut self, frame: &GrayFrame) -> (Vec<DetectionRect>, DetectionStats) {
        let (raw, stats) = self.detect_raw(frame);
        let grouped = group_rectangles(&raw, self.min_neighbors);
        log::debug!(
            "Detection: {} windows, {} raw hits, {} grouped",
            stats.windows_evaluated,
            raw.len(),
            grouped.len()
        );
        (grouped, stats)
    }

    /// Every window that passes all stages, before grouping
    #[allow(clippy::cast_precision_loss)]
    pub fn detect_raw(&mut self, frame: &GrayFrame) -> (Vec<DetectionRect>, DetectionStats) {
        let mut stats = DetectionStats {
            stage_features_evaluated: vec![0; self.cascade.stages().len()],
            ..DetectionStats::default()
        };
        let mut raw = Vec::new();

        let (cw, ch) = (self.cascade.width(), self.cascade.height());
        let octaves = self.pyramid.build(frame, cw, ch, self.scale_interval);
        let next = self.pyramid.next();
        let mut scale_x = 1.0;

        for i in 0..octaves {
            let strides = [
                self.pyramid.level(i, 0).stride(),
                self.pyramid.level(i + next, 0).stride(),
                self.pyramid.level(i + 2 * next, 0).stride(),
            ];
            resolve_offsets(self.cascade.sample_pairs(), strides, &mut self.offsets);

            let quarter = self.pyramid.level(i + 2 * next, 0);
            let qw = quarter.width().saturating_sub(cw / 4);
            let qh = quarter.height().saturating_sub(ch / 4);
            let window = WindowScan {
                cascade: &self.cascade,
                offsets: &self.offsets,
                strides,
            };

            for (q, &(dx, dy)) in VARIANT_OFFSETS.iter().enumerate() {
                let buffers = [
                    self.pyramid.level(i, 0).data(),
                    self.pyramid.level(i + next, 0).data(),
                    self.pyramid.level(i + 2 * next, q).data(),
                ];
                for y in 0..qh {
                    for x in 0..qw {
                        let origins = [
                            (4 * y + 2 * dy, 4 * x + 2 * dx),
                            (2 * y + dy, 2 * x + dx),
                            (y, x),
                        ];
                        stats.windows_evaluated += 1;
                        if let Some(confidence) = window.evaluate(&buffers, origins, &mut stats) {
                            stats.raw_detections += 1;
                            raw.push(DetectionRect {
                                x: (4 * x + 2 * dx) as f64 * scale_x,
                                y: (4 * y + 2 * dy) as f64 * scale_x,
                                width: cw as f64 * scale_x,
                                height: ch as f64 * scale_x,
                                confidence,
                                neighbors: 1,
                            });
                        }
                    }
                }
            }
            scale_x *= self.pyramid.scale();
        }

        (raw, stats)
    }
}

/// One-shot detection with a fresh detector
#[must_use]
pub fn detect_objects(
    frame: &GrayFrame,
    cascade: Arc<CascadeModel>,
    scale_interval: usize,
    min_neighbors: usize,
) -> Vec<DetectionRect> {
    ObjectDetector::with_params(cascade, scale_interval, min_neighbors).detect(frame)
}

#[allow(clippy::cast_sign_loss)] // cascade validation guarantees non-negative coordinates
fn resolve_sample(sample: Sample, strides: [usize; SAMPLE_LEVELS]) -> Option<(usize, usize)> {
    sample.level.map(|level| {
        let level = usize::from(level);
        (level, sample.x as usize + sample.y as usize * strides[level])
    })
}

fn resolve_offsets(pairs: &[SamplePair], strides: [usize; SAMPLE_LEVELS], offsets: &mut [PairOffsets]) {
    for (pair, offset) in pairs.iter().zip(offsets.iter_mut()) {
        *offset = PairOffsets {
            positive: resolve_sample(pair.positive, strides),
            negative: resolve_sample(pair.negative, strides),
        };
    }
}

/// Window evaluation context for one octave
struct WindowScan<'a> {
    cascade: &'a CascadeModel,
    offsets: &'a [PairOffsets],
    strides: [usize; SAMPLE_LEVELS],
}

impl WindowScan<'_> {
    /// Run all stages; `Some(last stage sum)` if the window is accepted
    fn evaluate(
        &self,
        buffers: &[&[u8]; SAMPLE_LEVELS],
        origins: [(usize, usize); SAMPLE_LEVELS],
        stats: &mut DetectionStats,
    ) -> Option<f64> {
        let base = [
            origins[0].0 * self.strides[0] + origins[0].1,
            origins[1].0 * self.strides[1] + origins[1].1,
            origins[2].0 * self.strides[2] + origins[2].1,
        ];
        let read = |probe: Option<(usize, usize)>| probe.map(|(level, offset)| buffers[level][base[level] + offset]);

        let mut sum = 0.0;
        for (s, stage) in self.cascade.stages().iter().enumerate() {
            stats.stage_features_evaluated[s] += stage.feature_count() as u64;
            sum = 0.0;
            for feature in self.cascade.stage_features(stage) {
                let pairs = &self.offsets[feature.samples()];
                let [fail, pass] = feature.alpha();
                sum += if feature_holds(pairs, read) { pass } else { fail };
            }
            if sum < stage.threshold() {
                return None;
            }
        }
        Some(sum)
    }
}

/// Every positive probe is strictly brighter than every negative probe
fn feature_holds(pairs: &[PairOffsets], read: impl Fn(Option<(usize, usize)>) -> Option<u8>) -> bool {
    let Some((first, rest)) = pairs.split_first() else {
        return false;
    };
    // Validation guarantees the first slot is used on both sides
    let (Some(mut pmin), Some(mut nmax)) = (read(first.positive), read(first.negative)) else {
        return false;
    };
    if pmin <= nmax {
        return false;
    }
    for pair in rest {
        if let Some(p) = read(pair.positive) {
            if p < pmin {
                if p <= nmax {
                    return false;
                }
                pmin = p;
            }
        }
        if let Some(n) = read(pair.negative) {
            if n > nmax {
                if pmin <= n {
                    return false;
                }
                nmax = n;
            }
        }
    }
    true
}
