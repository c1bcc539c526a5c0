//! Frame scheduling and detection-tracking fusion for real-time video.
//!
//! A [`FusionPipeline`] pulls frames from a [`FrameSource`], runs a
//! [`Detector`] on every n-th frame, maps its boxes back to frame pixels,
//! hands them to a [`Tracker`], filters the resulting tracks through an
//! optional [`Geofence`] and forwards annotated frames to [`OutputSink`]s.
//! Detector, tracker, capture and sinks are supplied by the caller.

pub mod capture;
pub mod error;
pub mod frame;
pub mod geofence;
pub mod integration;
pub mod tracker;
pub mod transform;

pub use capture::{CaptureProperties, FramePoll, FrameSource, InputSource, MemorySource, open_source};
pub use error::{Error, Result, Stage};
pub use frame::Frame;
pub use geofence::{Containment, Geofence, GeofenceConfig, Polygon};
pub use integration::{
    AnnotatedFrame, CycleOutput, CycleState, Detection, DetectionBuilder, Detector, FusionPipeline,
    NmsParams, OutputConfig, OutputSink, PipelineConfig, RunSummary, SinkSet, SinkSignal,
    StopHandle, StopReason, Throttle, ThrottleDecision,
};
pub use tracker::{Track, TrackSet, Tracker, TrackerInput};
pub use transform::{BoundingBox, CenterBox, Letterbox, LetterboxInfo};
