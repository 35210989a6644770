//! Configuration management for the head tracker

use crate::camshift::CamShiftParams;
use crate::constants::{
    DEFAULT_CAMERA_TO_SCREEN_OFFSET_CM, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DISTANCE_TO_SCREEN_CM,
    DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_INTERVAL, DEFAULT_SMOOTHING_ALPHA, DEFAULT_SMOOTHING_INTERVAL_MS,
    DEFAULT_STABILITY_TOLERANCE, DEFAULT_STABILITY_WINDOW, DEFAULT_WHITEBALANCE_TOLERANCE,
    DEFAULT_WHITEBALANCE_WINDOW, MEAN_SHIFT_MAX_ITERATIONS, SEARCH_WINDOW_GROWTH,
};
use crate::face_tracker::FaceTrackerParams;
use crate::filters::double_exponential::{DoubleExponentialSmoother, PredictionMode};
use crate::filters::{create_filter, NoFilter, TrackFilter};
use crate::head_position::HeadPositionParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cascade detector configuration
    pub detection: DetectionConfig,

    /// CAMShift tracker configuration
    pub camshift: CamShiftConfig,

    /// Face geometry smoothing
    pub smoothing: SmoothingConfig,

    /// Head position estimation
    pub head_position: HeadPositionConfig,

    /// State machine behaviour
    pub tracking: TrackingConfig,
}

/// Cascade detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Path to the cascade model (JSON)
    pub cascade_path: PathBuf,

    /// Minimum raw windows per reported face (0 disables grouping)
    pub min_neighbors: usize,

    /// Intermediate scales per pyramid octave
    pub scale_interval: usize,

    /// Detections must score above this to start tracking
    pub confidence_threshold: f64,
}

/// CAMShift parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamShiftConfig {
    /// Compute face orientation
    pub calc_angles: bool,

    /// Mean-shift iteration cap per frame
    pub max_iterations: usize,

    /// Search window size relative to the tracked face
    pub window_growth: f64,
}

/// Smoothing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Smooth tracked faces
    pub enabled: bool,

    /// Filter name, see [`crate::filters::create_filter`]
    pub filter: String,

    /// Double exponential smoothing factor
    pub alpha: f64,

    /// Update interval the prediction is expressed in
    pub interval_ms: f64,

    /// Interpolate predictions between whole intervals
    pub interpolate: bool,
}

/// Head position configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPositionConfig {
    /// Emit head positions
    pub enabled: bool,

    /// Camera horizontal field of view; calibrated from the first stable face if absent
    pub fov_degrees: Option<f64>,

    /// Assumed user distance while calibrating
    pub distance_to_screen_cm: f64,

    /// Vertical distance from camera to screen center
    pub camera_to_screen_offset_cm: f64,

    /// Correct faces cut off by the frame border
    pub edge_correction: bool,

    /// Face-size samples required before calibration
    pub stability_window: usize,

    /// Maximum relative face-size spread in that window
    pub stability_tolerance: f64,
}

/// State machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Wait for the camera brightness to settle before detecting
    pub whitebalancing: bool,

    /// Frames in the whitebalance window
    pub whitebalance_window: usize,

    /// Maximum gray-level spread in that window
    pub whitebalance_tolerance: f64,

    /// Detect again after a lost track
    pub retry_detection: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cascade_path: PathBuf::from("assets/face_cascade.json"),
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            scale_interval: DEFAULT_SCALE_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Default for CamShiftConfig {
    fn default() -> Self {
        Self {
            calc_angles: true,
            max_iterations: MEAN_SHIFT_MAX_ITERATIONS,
            window_growth: SEARCH_WINDOW_GROWTH,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "double_exponential".to_string(),
            alpha: DEFAULT_SMOOTHING_ALPHA,
            interval_ms: DEFAULT_SMOOTHING_INTERVAL_MS,
            interpolate: false,
        }
    }
}

impl Default for HeadPositionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fov_degrees: None,
            distance_to_screen_cm: DEFAULT_DISTANCE_TO_SCREEN_CM,
            camera_to_screen_offset_cm: DEFAULT_CAMERA_TO_SCREEN_OFFSET_CM,
            edge_correction: true,
            stability_window: DEFAULT_STABILITY_WINDOW,
            stability_tolerance: DEFAULT_STABILITY_TOLERANCE,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            whitebalancing: true,
            whitebalance_window: DEFAULT_WHITEBALANCE_WINDOW,
            whitebalance_tolerance: DEFAULT_WHITEBALANCE_TOLERANCE,
            retry_detection: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create the face smoothing filter from configuration
    ///
    /// # Errors
    ///
    /// Returns an error for unknown filter names or invalid parameters
    pub fn create_filter(&self) -> Result<Box<dyn TrackFilter>> {
        if !self.smoothing.enabled {
            return Ok(Box::new(NoFilter));
        }
        match self.smoothing.filter.as_str() {
            "double_exponential" => {
                let mode = if self.smoothing.interpolate {
                    PredictionMode::Interpolated
                } else {
                    PredictionMode::Discrete
                };
                Ok(Box::new(
                    DoubleExponentialSmoother::new(self.smoothing.alpha, self.smoothing.interval_ms)?.with_mode(mode),
                ))
            }
            name => create_filter(name),
        }
    }

    /// State machine parameters
    #[must_use]
    pub fn face_tracker_params(&self) -> FaceTrackerParams {
        FaceTrackerParams {
            whitebalancing: self.tracking.whitebalancing,
            whitebalance_window: self.tracking.whitebalance_window,
            whitebalance_tolerance: self.tracking.whitebalance_tolerance,
            confidence_threshold: self.detection.confidence_threshold,
            scale_interval: self.detection.scale_interval,
            min_neighbors: self.detection.min_neighbors,
            camshift: CamShiftParams {
                calc_angles: self.camshift.calc_angles,
                max_iterations: self.camshift.max_iterations,
                window_growth: self.camshift.window_growth,
            },
        }
    }

    /// Head position estimator parameters
    #[must_use]
    pub fn head_position_params(&self) -> HeadPositionParams {
        HeadPositionParams {
            fov_degrees: self.head_position.fov_degrees,
            distance_to_screen_cm: self.head_position.distance_to_screen_cm,
            camera_to_screen_offset_cm: self.head_position.camera_to_screen_offset_cm,
            edge_correction: self.head_position.edge_correction,
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first out-of-range value
    pub fn validate(&self) -> Result<()> {
        // Validate detection parameters
        if self.detection.scale_interval > 16 {
            return Err(Error::ConfigError(
                "Scale interval must be between 0 and 16".to_string(),
            ));
        }
        if !self.detection.confidence_threshold.is_finite() {
            return Err(Error::ConfigError("Confidence threshold must be finite".to_string()));
        }

        // Validate tracker parameters
        if self.camshift.max_iterations == 0 {
            return Err(Error::ConfigError(
                "Mean-shift iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.camshift.window_growth >= 1.0 && self.camshift.window_growth <= 4.0) {
            return Err(Error::ConfigError(
                "Search window growth must be between 1.0 and 4.0".to_string(),
            ));
        }

        // Validate smoothing parameters
        if !(self.smoothing.alpha > 0.0 && self.smoothing.alpha <= 1.0) {
            return Err(Error::ConfigError(
                "Smoothing alpha must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.smoothing.interval_ms > 0.0 && self.smoothing.interval_ms.is_finite()) {
            return Err(Error::ConfigError(
                "Smoothing interval must be greater than 0".to_string(),
            ));
        }

        // Validate head position parameters
        if let Some(fov) = self.head_position.fov_degrees {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(Error::ConfigError(
                    "Field of view must be between 0 and 180 degrees".to_string(),
                ));
            }
        }
        if !(self.head_position.distance_to_screen_cm > 0.0 && self.head_position.distance_to_screen_cm.is_finite()) {
            return Err(Error::ConfigError(
                "Distance to screen must be greater than 0".to_string(),
            ));
        }
        if !self.head_position.camera_to_screen_offset_cm.is_finite() {
            return Err(Error::ConfigError("Camera offset must be finite".to_string()));
        }
        if self.head_position.stability_window == 0 {
            return Err(Error::ConfigError(
                "Stability window must be greater than 0".to_string(),
            ));
        }
        if !(self.head_position.stability_tolerance > 0.0) {
            return Err(Error::ConfigError(
                "Stability tolerance must be greater than 0".to_string(),
            ));
        }

        // Validate whitebalance parameters
        if self.tracking.whitebalance_window == 0 {
            return Err(Error::ConfigError(
                "Whitebalance window must be greater than 0".to_string(),
            ));
        }
        if !(self.tracking.whitebalance_tolerance > 0.0) {
            return Err(Error::ConfigError(
                "Whitebalance tolerance must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Tracker Configuration

# Cascade detector
detection:
  cascade_path: "assets/face_cascade.json"
  min_neighbors: 1
  scale_interval: 5
  confidence_threshold: -10.0

# CAMShift tracker
camshift:
  calc_angles: true
  max_iterations: 10
  window_growth: 1.1

# Face smoothing
smoothing:
  enabled: true
  filter: "double_exponential"
  alpha: 0.35
  interval_ms: 35.0
  interpolate: false

# Head position (fov_degrees is calibrated from the first stable face when omitted)
head_position:
  enabled: true
  # fov_degrees: 60.0
  distance_to_screen_cm: 60.0
  camera_to_screen_offset_cm: 11.5
  edge_correction: true
  stability_window: 10
  stability_tolerance: 0.1

# State machine
tracking:
  whitebalancing: true
  whitebalance_window: 15
  whitebalance_tolerance: 2.0
  retry_detection: true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("smoothing:\n  alpha: 0.5\n").unwrap();
        assert!((parsed.smoothing.alpha - 0.5).abs() < f64::EPSILON);
        assert_eq!(parsed.smoothing.filter, "double_exponential");
        assert_eq!(parsed.detection.scale_interval, DEFAULT_SCALE_INTERVAL);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.smoothing.alpha = 0.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let mut config = Config::default();
        config.head_position.fov_degrees = Some(200.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camshift.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_filter_from_config() {
        let mut config = Config::default();
        assert_eq!(config.create_filter().unwrap().name(), "DoubleExponentialSmoother");
        config.smoothing.enabled = false;
        assert_eq!(config.create_filter().unwrap().name(), "NoFilter");
        config.smoothing.enabled = true;
        config.smoothing.filter = "bogus".to_string();
        assert!(config.create_filter().is_err());
    }
}
