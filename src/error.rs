//! Error types for the fusion pipeline.

use std::fmt;

/// Boxed error produced by an external collaborator (capture, detector, tracker).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Pipeline state in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingFrame,
    DetectOrReuse,
    Transform,
    TrackUpdate,
    FilterAndAnnotate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingFrame => "capture",
            Stage::DetectOrReuse => "detection",
            Stage::Transform => "transform",
            Stage::TrackUpdate => "tracker update",
            Stage::FilterAndAnnotate => "annotation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration, reported before the run starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A collaborator call or a frame-processing stage failed. The run
    /// cannot continue.
    #[error("{stage} stage failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: BoxError,
    },

    /// Frame raster does not have the expected shape.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// An output sink failed to write. Only that sink is affected.
    #[error("sink `{sink}` failed: {source}")]
    SinkWrite {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn collaborator<E>(stage: Stage, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Collaborator {
            stage,
            source: err.into(),
        }
    }

    /// Whether this error terminates the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SinkWrite { .. })
    }

    /// Stage that produced the error, if it came from a running cycle.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Collaborator { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
