//! Tracker collaborator contract.
//!
//! The association algorithm (motion model, appearance matching,
//! assignment) lives behind [`Tracker`]. The pipeline only feeds it
//! center-format detections and reads back track snapshots.

use crate::error::BoxError;
use crate::frame::Frame;
use crate::transform::{BoundingBox, CenterBox};

/// Detection handed to the tracker, in original-frame center format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerInput {
    pub bbox: CenterBox,
    pub confidence: f32,
    pub class_id: u32,
}

/// Snapshot of one tracked identity for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Track {
    /// Identity assigned by the tracker, stable while the object is followed.
    pub id: u64,
    /// Current box in original frame pixels (corner format).
    pub bbox: BoundingBox,
}

impl Track {
    pub fn new(id: u64, bbox: BoundingBox) -> Self {
        Self { id, bbox }
    }
}

/// Tracks reported for one cycle. IDs are unique within a set.
pub type TrackSet = Vec<Track>;

/// Multi-object tracker.
///
/// State persists across calls for the lifetime of a run. The pipeline calls
/// `update` once per detection cycle, including cycles with no detections so
/// stale tracks can age out.
pub trait Tracker {
    /// Error type for tracker failures.
    type Error: Into<BoxError>;

    fn update(&mut self, detections: &[TrackerInput], frame: &Frame)
    -> Result<TrackSet, Self::Error>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    type Error = T::Error;

    fn update(
        &mut self,
        detections: &[TrackerInput],
        frame: &Frame,
    ) -> Result<TrackSet, Self::Error> {
        (**self).update(detections, frame)
    }
}
