//! Constants used throughout the tracker

/// Quantization levels per color channel in the CAMShift histogram
pub const HISTOGRAM_LEVELS: usize = 16;

/// Total number of histogram bins (16 levels for each of R, G and B)
pub const HISTOGRAM_BINS: usize = HISTOGRAM_LEVELS * HISTOGRAM_LEVELS * HISTOGRAM_LEVELS;

/// Bit shift mapping an 8-bit channel value to its histogram level
pub const HISTOGRAM_SHIFT: u32 = 4;

/// Maximum number of mean-shift iterations per tracked frame
pub const MEAN_SHIFT_MAX_ITERATIONS: usize = 10;

/// Growth factor applied to the search window after each CAMShift step
pub const SEARCH_WINDOW_GROWTH: f64 = 1.1;

/// Default number of intermediate scales per pyramid octave
pub const DEFAULT_SCALE_INTERVAL: usize = 5;

/// Default minimum cluster size kept by detection grouping
pub const DEFAULT_MIN_NEIGHBORS: usize = 1;

/// Detection confidence a candidate must exceed before tracking starts
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = -10.0;

/// Confidence reported for CAMShift results (the tracker has no native score)
pub const CAMSHIFT_CONFIDENCE: f64 = 1.0;

/// Whitebalance samples that must agree before detection starts
pub const DEFAULT_WHITEBALANCE_WINDOW: usize = 15;

/// Maximum spread of the whitebalance window for a stable camera
pub const DEFAULT_WHITEBALANCE_TOLERANCE: f64 = 2.0;

/// Grayscale luminance weights
pub const LUMA_RED: f64 = 0.30;
pub const LUMA_GREEN: f64 = 0.59;
pub const LUMA_BLUE: f64 = 0.11;

/// Assumed physical head size in centimeters
pub const HEAD_WIDTH_CM: f64 = 16.0;
pub const HEAD_HEIGHT_CM: f64 = 19.0;

/// Assumed distance between user and camera at calibration time
pub const DEFAULT_DISTANCE_TO_SCREEN_CM: f64 = 60.0;

/// Vertical offset between camera and screen center
pub const DEFAULT_CAMERA_TO_SCREEN_OFFSET_CM: f64 = 11.5;

/// Pixel margin that triggers edge correction
pub const EDGE_CORRECTION_MARGIN_PX: f64 = 11.0;

/// Default double exponential smoothing parameters
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.35;
pub const DEFAULT_SMOOTHING_INTERVAL_MS: f64 = 35.0;

/// Face-size samples used to decide that the tracked geometry is stable
pub const DEFAULT_STABILITY_WINDOW: usize = 10;

/// Relative size spread tolerated by the stability gate
pub const DEFAULT_STABILITY_TOLERANCE: f64 = 0.1;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
