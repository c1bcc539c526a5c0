//! FusionPipeline combining throttled detection with tracking.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::capture::{FramePoll, FrameSource};
use crate::error::{Error, Result, Stage};
use crate::frame::Frame;
use crate::geofence::Geofence;
use crate::integration::{
    AnnotatedFrame, Annotator, CycleState, Detection, Detector, NmsParams, PipelineConfig,
    SinkSet, Throttle, ThrottleDecision, filter_classes,
};
use crate::tracker::{TrackSet, Tracker};
use crate::transform::{
    DegenerateDetection, Letterbox, LetterboxInfo, rescale_detections, to_input_tensor,
    to_tracker_inputs,
};

/// Cloneable flag used to ask a running pipeline to stop.
///
/// The request is honored between cycles; a cycle in progress always
/// completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    StopRequested,
    /// A sink (typically a display) asked to quit.
    QuitRequested,
}

/// Result of one cycle, up to and including annotation.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub decision: ThrottleDecision,
    /// Every track reported for this cycle, before geofence filtering.
    pub tracks: TrackSet,
    /// The annotated frame, carrying only the visible tracks.
    pub frame: AnnotatedFrame,
    /// Detections dropped after rescaling, empty on reuse cycles.
    pub dropped: Vec<DegenerateDetection>,
}

/// End-of-run statistics.
#[derive(Debug)]
pub struct RunSummary {
    pub frames: u64,
    pub detection_cycles: u32,
    /// Mean detector time over cycles where detection ran.
    pub mean_detect_time: Option<Duration>,
    /// Mean tracker time over cycles where detection ran.
    pub mean_track_time: Option<Duration>,
    pub mean_fps: f64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    pub dropped_detections: usize,
    pub stalls: u32,
    /// Write or close failures from sinks. None of them aborted the run.
    pub sink_failures: Vec<Error>,
}

impl RunSummary {
    fn log(&self) {
        let secs = |d: Option<Duration>| d.map_or(0.0, |d| d.as_secs_f64());
        log::info!(
            "Avg detect time ({:.3}s), track time ({:.3}s) per frame over {} detection cycles",
            secs(self.mean_detect_time),
            secs(self.mean_track_time),
            self.detection_cycles
        );
        log::info!(
            "Total time ({:.3}s), total frames: {}, stopped: {:?}",
            self.elapsed.as_secs_f64(),
            self.frames,
            self.stop_reason
        );
    }
}

#[derive(Default)]
struct RunTally {
    dropped: usize,
    stalls: u32,
    sink_failures: Vec<Error>,
}

/// A tracking pipeline that bundles a detector and a tracker.
///
/// Each acquired frame goes through one cycle: the throttle decides whether
/// to run detection; detections are rescaled to frame pixels and passed to
/// the tracker; the resulting tracks (or the cached ones on a reuse cycle)
/// are filtered by the geofence, drawn, and forwarded to the sinks.
pub struct FusionPipeline<D: Detector, T: Tracker> {
    detector: D,
    tracker: T,
    config: PipelineConfig,
    letterbox: Letterbox,
    throttle: Throttle,
    annotator: Annotator,
    nms: NmsParams,
    stop: StopHandle,
}

impl<D: Detector, T: Tracker> FusionPipeline<D, T> {
    /// Create a pipeline, validating `config` first.
    pub fn new(detector: D, tracker: T, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let geofence = Geofence::new(config.geofence.as_ref())?;
        Ok(Self {
            detector,
            tracker,
            letterbox: Letterbox::new(config.input_size)?,
            throttle: Throttle::new(config.frame_interval)?,
            annotator: Annotator::new(geofence),
            nms: config.nms_params(),
            stop: StopHandle::new(),
            config,
        })
    }

    /// Create a pipeline with the default configuration.
    pub fn with_default_config(detector: D, tracker: T) -> Result<Self> {
        Self::new(detector, tracker, PipelineConfig::default())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that stops [`run`](Self::run) after the current cycle.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Run until the stream ends, a stop is requested, or a fatal error.
    ///
    /// Takes ownership of the open source and sinks and releases all of
    /// them before returning, on success and on error alike.
    pub fn run<S: FrameSource>(&mut self, mut source: S, mut sinks: SinkSet) -> Result<RunSummary> {
        let props = source.properties();
        log::info!(
            "pipeline starting: {}x{} @ {:.2} fps, detect every {} frame(s), geofence {}, sinks {:?}",
            props.width,
            props.height,
            props.fps,
            self.throttle.interval(),
            if self.annotator.geofence().is_enabled() { "on" } else { "off" },
            sinks.active()
        );

        let mut state = CycleState::new();
        let mut tally = RunTally::default();
        let result = self.drive(&mut source, &mut sinks, &mut state, &mut tally);

        if let Err(err) = &result {
            log::error!(
                "{}; aborting after {} frames and releasing resources",
                err,
                state.frames()
            );
        }
        tally.sink_failures.extend(release(&mut source, &mut sinks));

        let stop_reason = result?;
        let summary = RunSummary {
            frames: state.frames(),
            detection_cycles: state.detect_time().samples(),
            mean_detect_time: state.detect_time().mean(),
            mean_track_time: state.track_time().mean(),
            mean_fps: state.fps(),
            elapsed: state.elapsed(),
            stop_reason,
            dropped_detections: tally.dropped,
            stalls: tally.stalls,
            sink_failures: tally.sink_failures,
        };
        summary.log();
        Ok(summary)
    }

    fn drive<S: FrameSource>(
        &mut self,
        source: &mut S,
        sinks: &mut SinkSet,
        state: &mut CycleState,
        tally: &mut RunTally,
    ) -> Result<StopReason> {
        loop {
            if self.stop.is_stop_requested() {
                log::info!("stop requested after {} frames", state.frames());
                return Ok(StopReason::StopRequested);
            }

            let poll = source
                .next_frame(self.config.read_timeout)
                .map_err(|e| Error::collaborator(Stage::AwaitingFrame, e))?;
            let pixels = match poll {
                FramePoll::Frame(pixels) => pixels,
                FramePoll::EndOfStream => {
                    log::info!("end of stream after {} frames", state.frames());
                    return Ok(StopReason::EndOfStream);
                }
                FramePoll::Stalled => {
                    tally.stalls += 1;
                    log::warn!(
                        "no frame within {:?} (stall #{}), still waiting",
                        self.config.read_timeout,
                        tally.stalls
                    );
                    continue;
                }
            };

            let frame = Frame::new(state.claim_index(), pixels)
                .map_err(|e| Error::collaborator(Stage::AwaitingFrame, e))?;
            let output = self.process_frame(state, frame)?;
            tally.dropped += output.dropped.len();

            let outcome = sinks.emit(&output.frame);
            tally.sink_failures.extend(outcome.failures);
            if outcome.quit {
                log::info!("quit requested by sink at frame {}", output.frame.index);
                return Ok(StopReason::QuitRequested);
            }
        }
    }

    /// Run one cycle for `frame`, up to annotation.
    ///
    /// On a reuse cycle the cached tracks from the last detection cycle are
    /// returned unchanged and neither collaborator is called.
    pub fn process_frame(&mut self, state: &mut CycleState, frame: Frame) -> Result<CycleOutput> {
        let started = Instant::now();
        let index = frame.index();
        let decision = self.throttle.decide(index);

        let (tracks, dropped) = match decision {
            ThrottleDecision::RunDetector => {
                let (detections, info, detect_time) = self.detect(&frame)?;

                let t0 = Instant::now();
                let rescaled = rescale_detections(&info, detections);
                let inputs = to_tracker_inputs(&rescaled.kept);
                let tracks = self
                    .tracker
                    .update(&inputs, &frame)
                    .map_err(|e| Error::collaborator(Stage::TrackUpdate, e))?;
                let track_time = t0.elapsed();

                state.record_detection(detect_time, track_time);
                state.cache_tracks(tracks.clone());
                log::debug!(
                    "Frame {} done. detect={:.3}s track={:.3}s detections={} tracks={}",
                    index,
                    detect_time.as_secs_f64(),
                    track_time.as_secs_f64(),
                    inputs.len(),
                    tracks.len()
                );
                (tracks, rescaled.dropped)
            }
            ThrottleDecision::ReuseLast => {
                let cached = state.last_tracks().cloned().ok_or_else(|| {
                    Error::Configuration(format!(
                        "frame {} reuses tracks but no detection cycle has run",
                        index
                    ))
                })?;
                (cached, Vec::new())
            }
        };
        state.record_cycle(started.elapsed());

        let frame = self
            .annotator
            .annotate(frame, &tracks, state.fps())
            .map_err(|e| Error::collaborator(Stage::FilterAndAnnotate, e))?;
        Ok(CycleOutput {
            decision,
            tracks,
            frame,
            dropped,
        })
    }

    /// Letterbox, infer, class-filter and suppress. Returns detector-space
    /// detections, the letterbox geometry and the detector time.
    fn detect(&mut self, frame: &Frame) -> Result<(Vec<Detection>, LetterboxInfo, Duration)> {
        let (padded, info) = self
            .letterbox
            .apply(frame)
            .map_err(|e| Error::collaborator(Stage::Transform, e))?;
        let tensor = to_input_tensor(padded.view());

        let t0 = Instant::now();
        let raw = self
            .detector
            .infer(tensor.view())
            .map_err(|e| Error::collaborator(Stage::DetectOrReuse, e))?;
        let candidates = filter_classes(raw, self.config.classes.as_deref());
        let detections = self.detector.non_max_suppression(candidates, &self.nms);
        let elapsed = t0.elapsed();

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "frame {} {}x{}: {}",
                frame.index(),
                info.target.0,
                info.target.1,
                self.class_summary(&detections)
            );
        }
        Ok((detections, info, elapsed))
    }

    fn class_summary(&self, detections: &[Detection]) -> String {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for det in detections {
            *counts.entry(det.class_id).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(class, n)| match self.detector.class_name(class) {
                Some(name) => format!("{} {}", n, name),
                None => format!("{} class{}", n, class),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Release the capture and every sink. Used on every exit path of a run.
fn release<S: FrameSource>(source: &mut S, sinks: &mut SinkSet) -> Vec<Error> {
    source.close();
    let failures = sinks.close_all();
    log::info!("capture and {} sink(s) released", sinks.len());
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MemorySource;
    use crate::integration::DetectionBuilder;
    use crate::tracker::{Track, TrackerInput};
    use ndarray::{Array3, ArrayView4};

    struct MockDetector {
        detections: Vec<Detection>,
    }

    impl Detector for MockDetector {
        type Error = std::convert::Infallible;

        fn infer(&mut self, _input: ArrayView4<'_, f32>) -> Result<Vec<Detection>, Self::Error> {
            Ok(self.detections.clone())
        }
    }

    /// Gives every detection the ID of its position, plus one.
    #[derive(Default)]
    struct EchoTracker {
        seen: Vec<Vec<TrackerInput>>,
    }

    impl Tracker for EchoTracker {
        type Error = std::convert::Infallible;

        fn update(
            &mut self,
            detections: &[TrackerInput],
            _frame: &Frame,
        ) -> Result<TrackSet, Self::Error> {
            self.seen.push(detections.to_vec());
            Ok(detections
                .iter()
                .enumerate()
                .map(|(i, d)| Track::new(i as u64 + 1, d.bbox.to_corners()))
                .collect())
        }
    }

    fn config(interval: u32) -> PipelineConfig {
        PipelineConfig {
            frame_interval: interval,
            input_size: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_fusion_pipeline() {
        let detector = MockDetector {
            detections: vec![
                DetectionBuilder::new()
                    .tlbr(10.0, 20.0, 50.0, 60.0)
                    .score(0.9)
                    .build(),
            ],
        };

        let mut pipeline = FusionPipeline::new(detector, EchoTracker::default(), config(1)).unwrap();
        let mut state = CycleState::new();
        let out = pipeline
            .process_frame(&mut state, Frame::filled(0, 64, 64, [0, 0, 0]))
            .unwrap();

        assert_eq!(out.decision, ThrottleDecision::RunDetector);
        assert_eq!(out.tracks.len(), 1);
        assert_eq!(out.tracks[0].bbox.to_array(), [10.0, 20.0, 50.0, 60.0]);
        assert_eq!(pipeline.tracker().seen[0][0].bbox.to_array(), [30.0, 40.0, 40.0, 40.0]);
    }

    #[test]
    fn test_detections_rescaled_to_frame() {
        let detector = MockDetector {
            detections: vec![
                DetectionBuilder::new()
                    .tlbr(8.0, 24.0, 24.0, 40.0)
                    .score(0.9)
                    .build(),
            ],
        };
        let mut pipeline = FusionPipeline::new(detector, EchoTracker::default(), config(1)).unwrap();
        let mut state = CycleState::new();
        // 128x64 letterboxed into 64x64: gain 0.5, 16 px of padding top and bottom.
        let out = pipeline
            .process_frame(&mut state, Frame::filled(0, 128, 64, [0, 0, 0]))
            .unwrap();
        assert_eq!(out.tracks[0].bbox.to_array(), [16.0, 16.0, 48.0, 48.0]);
    }

    #[test]
    fn test_class_filter_applied_before_tracking() {
        let detector = MockDetector {
            detections: vec![
                DetectionBuilder::new().tlbr(0.0, 0.0, 10.0, 10.0).score(0.9).class(0).build(),
                DetectionBuilder::new().tlbr(20.0, 20.0, 30.0, 30.0).score(0.9).class(5).build(),
            ],
        };
        let mut pipeline = FusionPipeline::new(detector, EchoTracker::default(), config(1)).unwrap();
        let mut state = CycleState::new();
        pipeline
            .process_frame(&mut state, Frame::filled(0, 64, 64, [0, 0, 0]))
            .unwrap();
        assert_eq!(pipeline.tracker().seen[0].len(), 1);
        assert_eq!(pipeline.tracker().seen[0][0].class_id, 0);
    }

    #[test]
    fn test_reuse_without_cache_is_error() {
        let detector = MockDetector { detections: vec![] };
        let mut pipeline = FusionPipeline::new(detector, EchoTracker::default(), config(2)).unwrap();
        let mut state = CycleState::new();
        let err = pipeline
            .process_frame(&mut state, Frame::filled(1, 64, 64, [0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let detector = MockDetector { detections: vec![] };
        assert!(FusionPipeline::new(detector, EchoTracker::default(), config(0)).is_err());
    }

    #[test]
    fn test_stop_handle_honored_between_cycles() {
        let detector = MockDetector { detections: vec![] };
        let mut pipeline = FusionPipeline::new(detector, EchoTracker::default(), config(1)).unwrap();
        pipeline.stop_handle().request_stop();

        let source = MemorySource::new(vec![Array3::zeros((64, 64, 3)); 3], 30.0);
        let summary = pipeline.run(source, SinkSet::new()).unwrap();
        assert_eq!(summary.stop_reason, StopReason::StopRequested);
        assert_eq!(summary.frames, 0);
    }
}
