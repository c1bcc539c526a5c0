//! Output sinks for annotated frames.
//!
//! Sinks are opened before the run starts and closed when it ends, whatever
//! the outcome. A sink that fails to write is disabled for the rest of the
//! run; the others keep receiving frames.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::capture::CaptureProperties;
use crate::error::{Error, Result};
use crate::integration::{AnnotatedFrame, OutputConfig};

/// File name of the annotated video stream inside `save_path`.
pub const VIDEO_FILE_NAME: &str = "results.bgr";

/// What a sink asks the pipeline to do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSignal {
    Continue,
    /// The user asked to stop, e.g. by pressing a quit key in a display.
    Quit,
}

/// A destination for annotated frames: display, video writer, text log.
pub trait OutputSink {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn emit(&mut self, frame: &AnnotatedFrame) -> io::Result<SinkSignal>;

    /// Flush and release the sink. Called exactly once at the end of a run.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct SinkSlot {
    sink: Box<dyn OutputSink>,
    enabled: bool,
}

/// Result of forwarding one frame to every sink.
#[derive(Debug, Default)]
pub struct EmitOutcome {
    /// A sink requested the run to stop.
    pub quit: bool,
    /// Sinks that failed on this frame and are now disabled.
    pub failures: Vec<Error>,
}

/// The set of sinks configured for a run.
#[derive(Default)]
pub struct SinkSet {
    slots: Vec<SinkSlot>,
}

impl std::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| (s.sink.name(), s.enabled)))
            .finish()
    }
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl OutputSink + 'static) {
        self.push_boxed(Box::new(sink));
    }

    pub fn push_boxed(&mut self, sink: Box<dyn OutputSink>) {
        self.slots.push(SinkSlot {
            sink,
            enabled: true,
        });
    }

    pub fn with(mut self, sink: impl OutputSink + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of sinks still receiving frames.
    pub fn active(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.sink.name())
            .collect()
    }

    /// Forward `frame` to every enabled sink.
    pub fn emit(&mut self, frame: &AnnotatedFrame) -> EmitOutcome {
        let mut outcome = EmitOutcome::default();
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            match slot.sink.emit(frame) {
                Ok(SinkSignal::Continue) => {}
                Ok(SinkSignal::Quit) => outcome.quit = true,
                Err(source) => {
                    slot.enabled = false;
                    let err = Error::SinkWrite {
                        sink: slot.sink.name().to_string(),
                        source,
                    };
                    log::error!("{}; sink disabled for the rest of the run", err);
                    outcome.failures.push(err);
                }
            }
        }
        outcome
    }

    /// Close every sink, including disabled ones, and report close failures.
    pub fn close_all(&mut self) -> Vec<Error> {
        let mut failures = Vec::new();
        for slot in self.slots.iter_mut() {
            if let Err(source) = slot.sink.close() {
                let err = Error::SinkWrite {
                    sink: slot.sink.name().to_string(),
                    source,
                };
                log::warn!("closing sink: {}", err);
                failures.push(err);
            }
            slot.enabled = false;
        }
        failures
    }
}

/// Appends one text file per frame listing the emitted tracks.
///
/// Each line is `x1\ty1\tx2\ty2\tid` in integer pixels.
#[derive(Debug)]
pub struct TrackTextLogger {
    dir: PathBuf,
}

impl TrackTextLogger {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("{:04}.txt", frame_index))
    }
}

impl OutputSink for TrackTextLogger {
    fn name(&self) -> &str {
        "text"
    }

    fn emit(&mut self, frame: &AnnotatedFrame) -> io::Result<SinkSignal> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(frame.index))?;
        let mut out = BufWriter::new(file);
        for track in &frame.tracks {
            let b = track.bbox.round();
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                b.x1 as i64, b.y1 as i64, b.x2 as i64, b.y2 as i64, track.id
            )?;
        }
        out.flush()?;
        Ok(SinkSignal::Continue)
    }
}

/// Writes annotated frames as a headerless BGR24 stream.
///
/// Encoding into a container format is left to external tools.
#[derive(Debug)]
pub struct RawVideoWriter {
    path: PathBuf,
    size: (usize, usize),
    writer: Option<BufWriter<File>>,
    frames: u64,
}

impl RawVideoWriter {
    pub fn create(path: impl AsRef<Path>, properties: &CaptureProperties) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        log::info!(
            "writing bgr24 {}x{} @ {:.2} fps to {}",
            properties.width,
            properties.height,
            properties.fps,
            path.display()
        );
        Ok(Self {
            path,
            size: (properties.width as usize, properties.height as usize),
            writer: Some(writer),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl OutputSink for RawVideoWriter {
    fn name(&self) -> &str {
        "video"
    }

    fn emit(&mut self, frame: &AnnotatedFrame) -> io::Result<SinkSignal> {
        let (height, width, _) = frame.pixels.dim();
        if (width, height) != self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame {}x{} does not match stream {}x{}",
                    width, height, self.size.0, self.size.1
                ),
            ));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("video writer already closed"))?;
        match frame.pixels.as_slice() {
            Some(bytes) => writer.write_all(bytes)?,
            None => {
                let bytes: Vec<u8> = frame.pixels.iter().copied().collect();
                writer.write_all(&bytes)?
            }
        }
        self.frames += 1;
        Ok(SinkSignal::Continue)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// Open the file sinks requested by `config`.
pub fn open_sinks(config: &OutputConfig, properties: &CaptureProperties) -> Result<SinkSet> {
    let mut sinks = SinkSet::new();
    if let Some(dir) = &config.save_path {
        fs::create_dir_all(dir)?;
        sinks.push(RawVideoWriter::create(dir.join(VIDEO_FILE_NAME), properties)?);
    }
    if let Some(dir) = &config.save_txt {
        sinks.push(TrackTextLogger::open(dir)?);
    }
    Ok(sinks)
}
