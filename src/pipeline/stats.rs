use std::time::{Duration, Instant};

use tracing::info;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Running totals for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    /// Detections that passed the filter
    pub detections: u64,
    /// Confirmed tracks summed over frames
    pub confirmed: u64,
    /// Commands accepted by the bus
    pub commands: u64,
    /// Commands dropped because the bus was full or closed
    pub dropped_commands: u64,
    pub detector_errors: u64,
}

impl PipelineStats {
    fn since(&self, earlier: &PipelineStats) -> PipelineStats {
        PipelineStats {
            frames: self.frames - earlier.frames,
            detections: self.detections - earlier.detections,
            confirmed: self.confirmed - earlier.confirmed,
            commands: self.commands - earlier.commands,
            dropped_commands: self.dropped_commands - earlier.dropped_commands,
            detector_errors: self.detector_errors - earlier.detector_errors,
        }
    }
}

/// Logs throughput once per `REPORT_INTERVAL`.
pub(crate) struct ThroughputReporter {
    window_start: Instant,
    at_window_start: PipelineStats,
}

impl ThroughputReporter {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            at_window_start: PipelineStats::default(),
        }
    }

    /// Emit a report if the window is over. Returns whether one was logged.
    pub(crate) fn tick(&mut self, totals: &PipelineStats, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < REPORT_INTERVAL {
            return false;
        }

        let window = totals.since(&self.at_window_start);
        let secs = elapsed.as_secs_f64();
        info!(
            fps = %format_args!("{:.1}", window.frames as f64 / secs),
            detections = window.detections,
            confirmed = window.confirmed,
            commands = window.commands,
            dropped = window.dropped_commands,
            detector_errors = window.detector_errors,
            "throughput"
        );

        self.window_start = now;
        self.at_window_start = *totals;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_once_per_interval() {
        let t0 = Instant::now();
        let mut reporter = ThroughputReporter::new(t0);
        let mut totals = PipelineStats::default();

        totals.frames = 10;
        assert!(!reporter.tick(&totals, t0 + Duration::from_millis(500)));
        totals.frames = 25;
        assert!(reporter.tick(&totals, t0 + Duration::from_millis(1000)));
        assert_eq!(reporter.at_window_start.frames, 25);
        assert!(!reporter.tick(&totals, t0 + Duration::from_millis(1500)));
    }
}
