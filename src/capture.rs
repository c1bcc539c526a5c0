//! Capture collaborator contract.
//!
//! Decoding and device access live outside this crate. A capture backend
//! implements [`FrameSource`]; the pipeline only pulls rasters from it and
//! closes it when the run ends.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use ndarray::Array3;
use serde::Deserialize;

use crate::error::{BoxError, Error, Result};

/// Stream properties reported by an open capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Result of waiting for the next frame.
#[derive(Debug)]
pub enum FramePoll {
    /// A raster in height x width x BGR layout.
    Frame(Array3<u8>),
    /// No more frames will arrive.
    EndOfStream,
    /// The read timeout elapsed without a frame. The stream may recover.
    Stalled,
}

/// An open capture stream.
pub trait FrameSource {
    /// Error type for read failures.
    type Error: Into<BoxError>;

    fn properties(&self) -> CaptureProperties;

    /// Block until a frame is available, the stream ends, or `timeout` elapses.
    ///
    /// A `None` timeout waits indefinitely.
    fn next_frame(&mut self, timeout: Option<Duration>) -> Result<FramePoll, Self::Error>;

    /// Release the underlying device or file.
    fn close(&mut self) {}
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum InputSource {
    File(PathBuf),
    Camera(u32),
}

/// Validate `input` and open it with the backend-provided `opener`.
///
/// A missing file or an opener failure is a configuration error, reported
/// before any frame is processed.
pub fn open_source<S, F, E>(input: &InputSource, opener: F) -> Result<S>
where
    S: FrameSource,
    F: FnOnce(&InputSource) -> Result<S, E>,
    E: std::fmt::Display,
{
    if let InputSource::File(path) = input {
        if !path.is_file() {
            return Err(Error::Configuration(format!(
                "input path {} does not exist",
                path.display()
            )));
        }
    }
    let source = opener(input).map_err(|err| {
        Error::Configuration(format!("cannot open capture source {:?}: {}", input, err))
    })?;
    let props = source.properties();
    log::info!(
        "capture opened: {:?} ({}x{} @ {:.2} fps)",
        input,
        props.width,
        props.height,
        props.fps
    );
    Ok(source)
}

/// In-memory frame stream.
///
/// Yields the queued rasters in order and then reports end of stream. Useful
/// for synthetic streams and tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Array3<u8>>,
    fps: f64,
    closed: bool,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Array3<u8>>, fps: f64) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            fps,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    type Error = std::convert::Infallible;

    fn properties(&self) -> CaptureProperties {
        let (height, width) = self
            .frames
            .front()
            .map(|f| (f.dim().0 as u32, f.dim().1 as u32))
            .unwrap_or((0, 0));
        CaptureProperties {
            width,
            height,
            fps: self.fps,
        }
    }

    fn next_frame(&mut self, _timeout: Option<Duration>) -> Result<FramePoll, Self::Error> {
        if self.closed {
            return Ok(FramePoll::EndOfStream);
        }
        Ok(match self.frames.pop_front() {
            Some(frame) => FramePoll::Frame(frame),
            None => FramePoll::EndOfStream,
        })
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames.clear();
    }
}
