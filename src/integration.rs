//! Integration of detection backends, trackers and output sinks into the
//! frame-by-frame fusion pipeline.
//!
//! This module provides the [`Detector`] trait for inference backends and
//! the [`FusionPipeline`] that schedules detection, feeds the tracker and
//! emits annotated frames.

mod annotate;
mod builder;
mod config;
mod detector;
mod pipeline;
mod sink;
mod state;
mod throttle;

pub use annotate::{AnnotatedFrame, Annotator, Overlay, color_for_id};
pub use builder::DetectionBuilder;
pub use config::{OutputConfig, PipelineConfig};
pub use detector::{
    Detection, Detector, MAX_DETECTIONS, NmsParams, filter_classes, non_max_suppression,
};
pub use pipeline::{CycleOutput, FusionPipeline, RunSummary, StopHandle, StopReason};
pub use sink::{
    EmitOutcome, OutputSink, RawVideoWriter, SinkSet, SinkSignal, TrackTextLogger,
    VIDEO_FILE_NAME, open_sinks,
};
pub use state::{CycleState, RunningMean};
pub use throttle::{Throttle, ThrottleDecision};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};
