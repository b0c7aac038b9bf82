//! The capture loop: one frame at a time through detection, filtering,
//! tracking and control, with the annotated result handed to presentation.
//!
//! A frame is fully processed, and its command handed to the bus, before the
//! next one is read. Capture failure ends the run; detector and association
//! failures only cost the current frame.

mod stats;
mod stop;

pub use stats::PipelineStats;
pub use stop::StopSignal;

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, debug_span, error, info, info_span, warn};

use crate::capture::FrameSource;
use crate::config::RoverConfig;
use crate::control::{ActuationCommand, CenteringController};
use crate::detection::{DetectionFilter, Detector};
use crate::dispatch::{CommandSender, ControlMode, Intent};
use crate::error::CaptureError;
use crate::frame::Frame;
use crate::presentation::{Annotator, Presentation, SlotSender};
use crate::tracker::{Associator, TrackManager};
use stats::ThroughputReporter;

/// Why a run ended.
#[derive(Debug)]
pub enum PipelineExit {
    /// The stop signal was raised
    Stopped { stats: PipelineStats },
    /// The frame source failed or ran dry
    CaptureFailed {
        stats: PipelineStats,
        error: CaptureError,
    },
}

impl PipelineExit {
    pub fn stats(&self) -> &PipelineStats {
        match self {
            Self::Stopped { stats } | Self::CaptureFailed { stats, .. } => stats,
        }
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub seq: u64,
    pub detections: usize,
    pub confirmed: usize,
    /// Command accepted by the bus for this frame
    pub command: Option<ActuationCommand>,
}

pub struct Pipeline<S, D, A> {
    source: S,
    detector: D,
    filter: DetectionFilter,
    tracks: TrackManager<A>,
    controller: CenteringController,
    annotator: Annotator,
    commands: CommandSender,
    mode: ControlMode,
    presentation: SlotSender<Presentation>,
    stop: StopSignal,
    stats: PipelineStats,
}

impl<S, D, A> Pipeline<S, D, A>
where
    S: FrameSource,
    D: Detector,
    A: Associator,
{
    pub fn new(
        config: &RoverConfig,
        source: S,
        detector: D,
        associator: A,
        commands: CommandSender,
        presentation: SlotSender<Presentation>,
    ) -> Self {
        Self {
            source,
            detector,
            filter: DetectionFilter::new(config.filter.clone()),
            tracks: TrackManager::new(config.tracking.clone(), associator),
            controller: CenteringController::new(config.control.clone()),
            annotator: Annotator::default(),
            commands,
            mode: ControlMode::new(config.auto_control),
            presentation,
            stop: StopSignal::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Share an externally owned auto/manual switch.
    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    /// Share an externally owned stop signal.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode.clone()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Run until stopped or the source fails.
    pub fn run(mut self) -> PipelineExit {
        let span = info_span!(
            "rover.pipeline",
            target_class = self.controller.config().target_class,
            dead_zone = self.controller.config().dead_zone_px,
            n_init = self.tracks.config().n_init,
            max_age = self.tracks.config().max_age,
        );
        let _guard = span.enter();
        info!(auto = self.mode.is_auto(), "pipeline started");

        let mut reporter = ThroughputReporter::new(Instant::now());
        loop {
            if self.stop.is_raised() {
                info!(frames = self.stats.frames, "stop requested");
                self.finish("stopped".to_string());
                return PipelineExit::Stopped { stats: self.stats };
            }

            let frame = match self.source.next_frame() {
                Ok(frame) => frame,
                Err(error) => {
                    match &error {
                        CaptureError::EndOfStream => info!(frames = self.stats.frames, "stream ended"),
                        other => error!(frames = self.stats.frames, "capture failed: {other}"),
                    }
                    self.finish(error.to_string());
                    return PipelineExit::CaptureFailed {
                        stats: self.stats,
                        error,
                    };
                }
            };

            self.process_frame(frame);
            reporter.tick(&self.stats, Instant::now());
        }
    }

    /// Run on a dedicated `capture` thread.
    pub fn spawn(self) -> io::Result<JoinHandle<PipelineExit>>
    where
        S: Send + 'static,
        D: Send + 'static,
        A: Send + 'static,
    {
        thread::Builder::new()
            .name("capture".into())
            .spawn(move || self.run())
    }

    /// Push one frame through every stage.
    pub fn process_frame(&mut self, frame: Frame) -> FrameOutcome {
        let span = debug_span!("frame", seq = frame.seq());
        let _guard = span.enter();

        let seq = frame.seq();
        let geometry = frame.geometry();
        self.stats.frames += 1;

        let (detections, confirmed) = match self.detector.infer(&frame) {
            Ok(raw) => {
                let raw_count = raw.len();
                let detections = self.filter.apply(raw);
                debug!("{} of {raw_count} detections kept", detections.len());
                let confirmed = self.tracks.update(&detections, geometry);
                (detections.len(), confirmed)
            }
            Err(err) => {
                warn!("detector failed, frame has no observations: {err}");
                self.stats.detector_errors += 1;
                self.tracks.skip_frame();
                (0, Vec::new())
            }
        };
        self.stats.detections += detections as u64;
        self.stats.confirmed += confirmed.len() as u64;

        // a previous movement must settle before control is evaluated again
        let auto = self.mode.is_auto();
        let settled = !auto || self.controller.wait_settled(&self.stop);
        let decision = self.controller.decide(&confirmed, geometry);
        let sent = match decision {
            Some(decision) if auto && settled => self.submit(decision.command, seq),
            _ => None,
        };

        let mut annotated = self.annotator.annotate(frame, &confirmed, decision);
        annotated.command = sent;
        self.presentation.publish(Presentation::Frame(annotated));

        FrameOutcome {
            seq,
            detections,
            confirmed: confirmed.len(),
            command: sent,
        }
    }

    fn submit(&mut self, command: ActuationCommand, seq: u64) -> Option<ActuationCommand> {
        if self.commands.submit(Intent::auto(command, seq)) {
            debug!(%command, "command queued");
            self.stats.commands += 1;
            self.controller.command_sent(command, Instant::now());
            Some(command)
        } else {
            self.stats.dropped_commands += 1;
            None
        }
    }

    fn finish(&self, reason: String) {
        self.presentation.publish(Presentation::Ended {
            frames: self.stats.frames,
            reason,
        });
        info!(
            frames = self.stats.frames,
            commands = self.stats.commands,
            dropped = self.stats.dropped_commands,
            detector_errors = self.stats.detector_errors,
            "pipeline finished"
        );
    }
}
