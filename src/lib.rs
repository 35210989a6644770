//! Head tracking library for head-coupled perspective displays.
//!
//! This library finds a face in camera frames and follows it to estimate
//! where the viewer's head is relative to the screen:
//! - A binary-feature cascade detector scanned over an image pyramid
//! - CAMShift color tracking once a face has been found
//! - Double exponential smoothing of the tracked face
//! - A pinhole-camera model turning face size and position into centimeters
//!
//! The tracking pipeline consists of:
//! 1. Waiting for the camera whitebalance to settle
//! 2. Cascade detection until a confident face is found
//! 3. CAMShift tracking of the face's skin colors
//! 4. Smoothing and head position estimation
//!
//! # Examples
//!
//! ## Detecting faces
//!
//! ```no_run
//! use headtrack::{cascade::CascadeModel, detector::ObjectDetector, utils::image_conversion::load_frame};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cascade = Arc::new(CascadeModel::from_file("assets/face_cascade.json")?);
//! let mut detector = ObjectDetector::new(cascade);
//!
//! let frame = load_frame("test.png")?;
//! for face in detector.detect(&frame.to_gray()) {
//!     println!("Face at ({:.0}, {:.0}) size {:.0}", face.x, face.y, face.width);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use headtrack::{
//!     app::{HeadTracker, TrackingEvent},
//!     cascade::CascadeModel,
//!     config::Config,
//!     utils::image_conversion::ImageSequenceSource,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let cascade = Arc::new(CascadeModel::from_file(&config.detection.cascade_path)?);
//!
//! let sink = |event: TrackingEvent| {
//!     if let TrackingEvent::Head(head) = event {
//!         println!("Head at x={:.1} y={:.1} z={:.1} cm", head.x, head.y, head.z);
//!     }
//! };
//! let mut tracker = HeadTracker::new(cascade, &config, sink)?;
//! let mut source = ImageSequenceSource::from_dir("frames")?;
//! tracker.run(&mut source)?;
//! # Ok(())
//! # }
//! ```

/// Pipeline driving frames through tracking and estimation
pub mod app;

/// Mean-shift color tracking
pub mod camshift;

/// Cascade classifier model and loader
pub mod cascade;

/// Configuration management
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// Multi-scale cascade detection
pub mod detector;

/// Error types and result handling
pub mod error;

/// Whitebalance, detection and tracking state machine
pub mod face_tracker;

/// Smoothing filters for tracked face geometry
pub mod filters;

/// RGBA and grayscale frame buffers
pub mod frame;

/// Face geometry to head position in centimeters
pub mod head_position;

/// Sliding-window stability checks
pub mod stability;

/// Utility types, numeric casts and image conversion
pub mod utils;

pub use error::{Error, Result};
