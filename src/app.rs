//! Tracking pipeline: frames in, events out.
//!
//! `HeadTracker` pulls frames from a [`FrameSource`], runs the face tracking
//! state machine, smooths the tracked geometry, calibrates the head-position
//! estimator once the face size is steady, and hands every result to an
//! [`EventSink`].

use crate::{
    cascade::CascadeModel,
    config::Config,
    face_tracker::{DetectionMode, FaceTracker, TrackedFace},
    filters::TrackFilter,
    frame::RgbaFrame,
    head_position::{HeadPosition, HeadPositionEstimator},
    stability::StabilityWindow,
    Result,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{mpsc, Arc};
use std::time::Instant;

/// Supplier of camera frames
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be produced
    fn next_frame(&mut self) -> Result<Option<RgbaFrame>>;
}

/// Frames from any iterator
pub struct IterSource<I>(pub I);

impl<I: Iterator<Item = RgbaFrame>> FrameSource for IterSource<I> {
    fn next_frame(&mut self) -> Result<Option<RgbaFrame>> {
        Ok(self.0.next())
    }
}

/// Tracker status changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    /// Waiting for the camera brightness to settle
    Whitebalance,
    /// Searching for a face
    Detecting,
    /// Face found, tracking started
    Found,
    /// Track lost
    Lost,
    /// Searching again after a lost track
    Redetecting,
    /// Frame source exhausted
    Stopped,
}

/// Everything the tracker reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TrackingEvent {
    Status(TrackerStatus),
    Face(TrackedFace),
    Head(HeadPosition),
}

/// Receiver of tracking events
pub trait EventSink {
    fn emit(&mut self, event: TrackingEvent);
}

impl<F: FnMut(TrackingEvent)> EventSink for F {
    fn emit(&mut self, event: TrackingEvent) {
        self(event);
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<TrackingEvent>,
}

impl EventSink for VecSink {
    fn emit(&mut self, event: TrackingEvent) {
        self.events.push(event);
    }
}

/// Forwards events to another thread
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<TrackingEvent>,
}

impl ChannelSink {
    /// Sink and the matching receiver
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<TrackingEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: TrackingEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped, discarding {event:?}");
        }
    }
}

/// Complete head tracking pipeline
pub struct HeadTracker<K: EventSink> {
    config: Config,
    face_tracker: FaceTracker,
    filter: Box<dyn TrackFilter>,
    width_window: StabilityWindow,
    height_window: StabilityWindow,
    estimator: Option<HeadPositionEstimator>,
    sink: K,
    frames: u64,
}

impl<K: EventSink> HeadTracker<K> {
    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(cascade: Arc<CascadeModel>, config: &Config, sink: K) -> Result<Self> {
        config.validate()?;
        let filter = config.create_filter()?;
        info!(
            "Head tracker created: {} stage cascade, {} filter",
            cascade.stages().len(),
            filter.name()
        );
        Ok(Self {
            face_tracker: FaceTracker::new(cascade, config.face_tracker_params()),
            filter,
            width_window: StabilityWindow::new(config.head_position.stability_window),
            height_window: StabilityWindow::new(config.head_position.stability_window),
            estimator: None,
            config: config.clone(),
            sink,
            frames: 0,
        })
    }

    #[must_use]
    pub fn face_tracker(&self) -> &FaceTracker {
        &self.face_tracker
    }

    #[must_use]
    pub fn estimator(&self) -> Option<&HeadPositionEstimator> {
        self.estimator.as_ref()
    }

    #[must_use]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    #[must_use]
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Frames processed so far
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Process frames until the source is exhausted; returns the frame count
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or the estimator cannot be calibrated
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<u64> {
        info!("Starting tracking loop");
        let start = Instant::now();
        while let Some(frame) = source.next_frame()? {
            self.process_frame(&frame)?;
        }
        self.sink.emit(TrackingEvent::Status(TrackerStatus::Stopped));
        info!(
            "Tracking stopped after {} frames in {:.2}s",
            self.frames,
            start.elapsed().as_secs_f64()
        );
        Ok(self.frames)
    }

    /// Run one tracking cycle
    ///
    /// # Errors
    ///
    /// Returns an error if the head-position estimator cannot be calibrated
    pub fn process_frame(&mut self, frame: &RgbaFrame) -> Result<TrackedFace> {
        let before = self.face_tracker.mode();
        if self.frames == 0 {
            let status = match before {
                DetectionMode::Whitebalance => TrackerStatus::Whitebalance,
                _ => TrackerStatus::Detecting,
            };
            self.sink.emit(TrackingEvent::Status(status));
        }
        self.frames += 1;

        let face = self.face_tracker.track(frame);
        let after = self.face_tracker.mode();
        if before != after {
            match after {
                DetectionMode::Detection => self.sink.emit(TrackingEvent::Status(TrackerStatus::Detecting)),
                DetectionMode::CamShift => {
                    self.filter.reset();
                    self.sink.emit(TrackingEvent::Status(TrackerStatus::Found));
                }
                DetectionMode::Whitebalance => {}
            }
        }

        if face.mode != DetectionMode::CamShift {
            return Ok(face);
        }
        if !face.found {
            self.handle_lost();
            return Ok(face);
        }

        let smoothed = self.filter.apply(&face.to_vector(), 0.0);
        let face = face.with_geometry(&smoothed);
        self.sink.emit(TrackingEvent::Face(face));

        if self.config.head_position.enabled {
            self.update_head_position(&face, frame)?;
        }
        Ok(face)
    }

    fn handle_lost(&mut self) {
        warn!("Lost track of the face after {} frames", self.frames);
        self.sink.emit(TrackingEvent::Status(TrackerStatus::Lost));
        self.filter.reset();
        self.width_window.reset();
        self.height_window.reset();
        if self.config.tracking.retry_detection {
            self.face_tracker.reset_to_detection();
            self.sink.emit(TrackingEvent::Status(TrackerStatus::Redetecting));
        }
    }

    fn update_head_position(&mut self, face: &TrackedFace, frame: &RgbaFrame) -> Result<()> {
        if self.estimator.is_none() {
            self.width_window.push(face.width);
            self.height_window.push(face.height);
            let tolerance = self.config.head_position.stability_tolerance;
            if !(self.width_window.is_relatively_stable(tolerance) && self.height_window.is_relatively_stable(tolerance))
            {
                return Ok(());
            }
            self.estimator = Some(HeadPositionEstimator::new(
                face,
                frame.width(),
                frame.height(),
                self.config.head_position_params(),
            )?);
        }

        if let Some(position) = self.estimator.as_mut().and_then(|est| est.track(face)) {
            self.sink.emit(TrackingEvent::Head(position));
        }
        Ok(())
    }
}
