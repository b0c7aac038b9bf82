use std::thread;
use std::time::{Duration, Instant};

use crate::pipeline::StopSignal;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Hold-off after a motion command so the vehicle can respond before the
/// next control evaluation.
#[derive(Debug, Clone, Default)]
pub struct SettleTimer {
    deadline: Option<Instant>,
}

impl SettleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn is_settling(&self, now: Instant) -> bool {
        !self.remaining(now).is_zero()
    }

    /// Block until the delay has elapsed. Returns `false` if `stop` was
    /// raised first.
    pub fn wait(&mut self, stop: &StopSignal) -> bool {
        while let Some(deadline) = self.deadline {
            if stop.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                self.deadline = None;
                break;
            }
            thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_timer_does_not_block() {
        let mut timer = SettleTimer::new();
        assert!(!timer.is_settling(Instant::now()));
        assert!(timer.wait(&StopSignal::new()));
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut timer = SettleTimer::new();
        let t0 = Instant::now();
        timer.arm(t0, Duration::from_millis(50));
        assert_eq!(timer.remaining(t0), Duration::from_millis(50));
        assert_eq!(timer.remaining(t0 + Duration::from_millis(20)), Duration::from_millis(30));
        assert!(!timer.is_settling(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_wait_elapses() {
        let mut timer = SettleTimer::new();
        let start = Instant::now();
        timer.arm(start, Duration::from_millis(30));
        assert!(timer.wait(&StopSignal::new()));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!timer.is_settling(Instant::now()));
    }

    #[test]
    fn test_wait_aborts_on_stop() {
        let mut timer = SettleTimer::new();
        timer.arm(Instant::now(), Duration::from_secs(60));
        let stop = StopSignal::new();
        stop.raise();
        assert!(!timer.wait(&stop));
    }
}
