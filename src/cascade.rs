//! Boosted binary-feature cascade model.
//!
//! The model is loaded once and never mutated. Stages, features and sample
//! points live in flat arenas indexed by ranges, so the detector can derive
//! per-octave pixel offsets into its own scratch table without touching the
//! canonical coordinates.
//!
//! The JSON layout accepted by [`CascadeModel::from_json_str`] is the one used
//! by ccv/jsfeat brightness-binary-feature cascades:
//!
//! ```json
//! {"count": 1, "width": 24, "height": 24,
//!  "stage_classifier": [{"count": 1, "threshold": -0.5,
//!    "feature": [{"size": 2, "px": [3, 0], "py": [4, 0], "pz": [0, -1],
//!                 "nx": [10, 2], "ny": [4, 2], "nz": [0, 2]}],
//!    "alpha": [-1.0, 1.0]}]}
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::ops::Range;
use std::path::Path;

/// Number of pyramid levels a feature sample can address
/// (full, half and quarter resolution relative to the window)
pub const SAMPLE_LEVELS: usize = 3;

/// A single pixel probe inside the detection window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Column inside the window at `level` resolution
    pub x: i32,
    /// Row inside the window at `level` resolution
    pub y: i32,
    /// Pyramid level (0..3), or `None` when the slot is unused
    pub level: Option<u8>,
}

impl Sample {
    #[must_use]
    pub fn new(x: i32, y: i32, level: u8) -> Self {
        Self {
            x,
            y,
            level: Some(level),
        }
    }

    #[must_use]
    pub fn unused() -> Self {
        Self {
            x: 0,
            y: 0,
            level: None,
        }
    }
}

/// Positive and negative probes sharing one slot of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePair {
    pub positive: Sample,
    pub negative: Sample,
}

/// Binary brightness feature: "every positive probe is brighter than every negative probe"
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    samples: Range<usize>,
    alpha: [f64; 2],
}

impl Feature {
    /// Range into [`CascadeModel::sample_pairs`]
    #[must_use]
    pub fn samples(&self) -> Range<usize> {
        self.samples.clone()
    }

    /// Contribution when the feature fails (`alpha[0]`) or holds (`alpha[1]`)
    #[must_use]
    pub fn alpha(&self) -> [f64; 2] {
        self.alpha
    }
}

/// One stage of the cascade
#[derive(Debug, Clone, PartialEq)]
pub struct StageClassifier {
    threshold: f64,
    features: Range<usize>,
}

impl StageClassifier {
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Range into [`CascadeModel::features`]
    #[must_use]
    pub fn features(&self) -> Range<usize> {
        self.features.clone()
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

/// Immutable, validated cascade model
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeModel {
    width: usize,
    height: usize,
    stages: Vec<StageClassifier>,
    features: Vec<Feature>,
    sample_pairs: Vec<SamplePair>,
}

impl CascadeModel {
    /// Start building a cascade for a `width` x `height` detection window
    #[must_use]
    pub fn builder(width: usize, height: usize) -> CascadeBuilder {
        CascadeBuilder {
            width,
            height,
            stages: Vec::new(),
        }
    }

    /// Parse and validate a cascade in ccv JSON layout
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the cascade fails validation
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawCascade = serde_json::from_str(json)?;
        raw.into_model()
    }

    /// Load a cascade from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a valid cascade
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading cascade from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json_str(&content)?;
        log::info!(
            "Cascade loaded: {}x{} window, {} stages, {} features",
            model.width,
            model.height,
            model.stages.len(),
            model.features.len()
        );
        Ok(model)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn stages(&self) -> &[StageClassifier] {
        &self.stages
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn sample_pairs(&self) -> &[SamplePair] {
        &self.sample_pairs
    }

    #[must_use]
    pub fn stage_features(&self, stage: &StageClassifier) -> &[Feature] {
        &self.features[stage.features()]
    }

    #[must_use]
    pub fn feature_samples(&self, feature: &Feature) -> &[SamplePair] {
        &self.sample_pairs[feature.samples()]
    }
}

/// Feature description used by [`CascadeBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub positive: Vec<Sample>,
    pub negative: Vec<Sample>,
    pub alpha: [f64; 2],
}

/// Incremental construction of a validated [`CascadeModel`]
#[derive(Debug, Clone)]
pub struct CascadeBuilder {
    width: usize,
    height: usize,
    stages: Vec<(f64, Vec<FeatureSpec>)>,
}

impl CascadeBuilder {
    /// Append a stage with its rejection threshold
    #[must_use]
    pub fn stage(mut self, threshold: f64, features: Vec<FeatureSpec>) -> Self {
        self.stages.push((threshold, features));
        self
    }

    /// Validate and freeze the cascade
    ///
    /// # Errors
    ///
    /// Returns [`Error::CascadeFormat`] describing the first invalid stage or feature
    pub fn build(self) -> Result<CascadeModel> {
        if self.width == 0 || self.height == 0 || self.width % 4 != 0 || self.height % 4 != 0 {
            return Err(Error::CascadeFormat(format!(
                "Window size {}x{} must be positive and divisible by 4",
                self.width, self.height
            )));
        }
        if self.stages.is_empty() {
            return Err(Error::CascadeFormat("Cascade has no stages".to_string()));
        }

        let mut stages = Vec::with_capacity(self.stages.len());
        let mut features = Vec::new();
        let mut sample_pairs = Vec::new();

        for (s, (threshold, specs)) in self.stages.into_iter().enumerate() {
            if !threshold.is_finite() {
                return Err(Error::CascadeFormat(format!("Stage {s}: threshold is not finite")));
            }
            if specs.is_empty() {
                return Err(Error::CascadeFormat(format!("Stage {s}: no features")));
            }
            let first_feature = features.len();
            for (f, spec) in specs.into_iter().enumerate() {
                validate_feature(&spec, self.width, self.height)
                    .map_err(|msg| Error::CascadeFormat(format!("Stage {s}, feature {f}: {msg}")))?;
                let start = sample_pairs.len();
                sample_pairs.extend(
                    spec.positive
                        .iter()
                        .zip(&spec.negative)
                        .map(|(&positive, &negative)| SamplePair { positive, negative }),
                );
                features.push(Feature {
                    samples: start..sample_pairs.len(),
                    alpha: spec.alpha,
                });
            }
            stages.push(StageClassifier {
                threshold,
                features: first_feature..features.len(),
            });
        }

        Ok(CascadeModel {
            width: self.width,
            height: self.height,
            stages,
            features,
            sample_pairs,
        })
    }
}

fn validate_feature(spec: &FeatureSpec, width: usize, height: usize) -> std::result::Result<(), String> {
    if spec.positive.is_empty() || spec.positive.len() != spec.negative.len() {
        return Err(format!(
            "expected matching non-empty sample lists, got {} positive and {} negative",
            spec.positive.len(),
            spec.negative.len()
        ));
    }
    if !spec.alpha.iter().all(|a| a.is_finite()) {
        return Err("alpha is not finite".to_string());
    }
    if spec.positive[0].level.is_none() || spec.negative[0].level.is_none() {
        return Err("first positive and negative samples must be used".to_string());
    }
    for (kind, samples) in [("positive", &spec.positive), ("negative", &spec.negative)] {
        for (i, sample) in samples.iter().enumerate() {
            let Some(level) = sample.level else { continue };
            if usize::from(level) >= SAMPLE_LEVELS {
                return Err(format!("{kind} sample {i} addresses level {level}"));
            }
            let level_w = width >> level;
            let level_h = height >> level;
            let inside = usize::try_from(sample.x).is_ok_and(|x| x < level_w)
                && usize::try_from(sample.y).is_ok_and(|y| y < level_h);
            if !inside {
                return Err(format!(
                    "{kind} sample {i} at ({}, {}) outside the {level_w}x{level_h} level-{level} window",
                    sample.x, sample.y
                ));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawCascade {
    #[serde(default)]
    count: Option<usize>,
    width: usize,
    height: usize,
    stage_classifier: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
struct RawStage {
    count: usize,
    threshold: f64,
    feature: Vec<RawFeature>,
    alpha: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    size: usize,
    px: Vec<i32>,
    py: Vec<i32>,
    pz: Vec<i32>,
    nx: Vec<i32>,
    ny: Vec<i32>,
    nz: Vec<i32>,
}

impl RawCascade {
    fn into_model(self) -> Result<CascadeModel> {
        if let Some(count) = self.count {
            if count != self.stage_classifier.len() {
                return Err(Error::CascadeFormat(format!(
                    "Declared {count} stages, found {}",
                    self.stage_classifier.len()
                )));
            }
        }

        let mut builder = CascadeModel::builder(self.width, self.height);
        for (s, stage) in self.stage_classifier.into_iter().enumerate() {
            if stage.count != stage.feature.len() {
                return Err(Error::CascadeFormat(format!(
                    "Stage {s}: declared {} features, found {}",
                    stage.count,
                    stage.feature.len()
                )));
            }
            if stage.alpha.len() != 2 * stage.count {
                return Err(Error::CascadeFormat(format!(
                    "Stage {s}: expected {} alpha values, found {}",
                    2 * stage.count,
                    stage.alpha.len()
                )));
            }
            let mut specs = Vec::with_capacity(stage.count);
            for (f, (raw, alpha)) in stage.feature.into_iter().zip(stage.alpha.chunks_exact(2)).enumerate() {
                let spec = raw
                    .into_spec([alpha[0], alpha[1]])
                    .map_err(|msg| Error::CascadeFormat(format!("Stage {s}, feature {f}: {msg}")))?;
                specs.push(spec);
            }
            builder = builder.stage(stage.threshold, specs);
        }
        builder.build()
    }
}

impl RawFeature {
    fn into_spec(self, alpha: [f64; 2]) -> std::result::Result<FeatureSpec, String> {
        let lengths = [
            self.px.len(),
            self.py.len(),
            self.pz.len(),
            self.nx.len(),
            self.ny.len(),
            self.nz.len(),
        ];
        if lengths.iter().any(|&len| len != self.size) {
            return Err(format!("sample arrays {lengths:?} do not match size {}", self.size));
        }
        Ok(FeatureSpec {
            positive: to_samples(&self.px, &self.py, &self.pz)?,
            negative: to_samples(&self.nx, &self.ny, &self.nz)?,
            alpha,
        })
    }
}

fn to_samples(xs: &[i32], ys: &[i32], zs: &[i32]) -> std::result::Result<Vec<Sample>, String> {
    xs.iter()
        .zip(ys)
        .zip(zs)
        .map(|((&x, &y), &z)| match z {
            -1 => Ok(Sample::unused()),
            0..=2 => Ok(Sample::new(x, y, u8::try_from(z).unwrap_or_default())),
            other => Err(format!("invalid pyramid level {other}")),
        })
        .collect()
}
