//! Decides which frames run the detector.

use crate::error::{Error, Result};

/// What to do with the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    RunDetector,
    ReuseLast,
}

/// Runs detection on every `interval`-th frame, starting with frame 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    interval: u32,
}

impl Throttle {
    /// An interval of zero would never detect and is rejected.
    pub fn new(interval: u32) -> Result<Self> {
        if interval == 0 {
            return Err(Error::Configuration(
                "frame interval must be at least 1".into(),
            ));
        }
        Ok(Self { interval })
    }

    #[inline]
    pub fn interval(&self) -> u32 {
        self.interval
    }

    #[inline]
    pub fn decide(&self, frame_index: u64) -> ThrottleDecision {
        if frame_index % u64::from(self.interval) == 0 {
            ThrottleDecision::RunDetector
        } else {
            ThrottleDecision::ReuseLast
        }
    }
}
