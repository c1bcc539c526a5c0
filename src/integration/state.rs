//! Per-run mutable state carried from one cycle to the next.

use std::time::{Duration, Instant};

use crate::tracker::TrackSet;

/// Arithmetic mean over every sample recorded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    total: Duration,
    samples: u32,
}

impl RunningMean {
    pub fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.samples += 1;
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// `None` until at least one sample is recorded.
    pub fn mean(&self) -> Option<Duration> {
        (self.samples > 0).then(|| self.total / self.samples)
    }
}

/// State created at pipeline start and mutated once per cycle.
#[derive(Debug)]
pub struct CycleState {
    next_index: u64,
    last_tracks: Option<TrackSet>,
    cycle_time: RunningMean,
    detect_time: RunningMean,
    track_time: RunningMean,
    started: Instant,
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            last_tracks: None,
            cycle_time: RunningMean::default(),
            detect_time: RunningMean::default(),
            track_time: RunningMean::default(),
            started: Instant::now(),
        }
    }

    /// Hand out the index for a newly acquired frame.
    pub fn claim_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Number of frames acquired so far.
    pub fn frames(&self) -> u64 {
        self.next_index
    }

    /// Track set from the most recent detection cycle.
    pub fn last_tracks(&self) -> Option<&TrackSet> {
        self.last_tracks.as_ref()
    }

    pub fn cache_tracks(&mut self, tracks: TrackSet) {
        self.last_tracks = Some(tracks);
    }

    /// Record detector and tracker durations for a cycle where detection ran.
    pub fn record_detection(&mut self, detect: Duration, track: Duration) {
        self.detect_time.record(detect);
        self.track_time.record(track);
    }

    pub fn record_cycle(&mut self, elapsed: Duration) {
        self.cycle_time.record(elapsed);
    }

    pub fn detect_time(&self) -> &RunningMean {
        &self.detect_time
    }

    pub fn track_time(&self) -> &RunningMean {
        &self.track_time
    }

    pub fn cycle_time(&self) -> &RunningMean {
        &self.cycle_time
    }

    /// Cycles per second over all cycles so far, from their mean duration.
    pub fn fps(&self) -> f64 {
        let total = self.cycle_time.total().as_secs_f64();
        if total > 0.0 {
            f64::from(self.cycle_time.samples()) / total
        } else {
            0.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
