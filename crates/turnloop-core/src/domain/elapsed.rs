//! Elapsed-time counter.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Stopped,
    Cancelled,
}

/// Monotonic stopwatch measuring one task (or one whole run).
///
/// - `start` begins a fresh measurement.
/// - `stop` finalizes it.
/// - `restart` resumes after a pause; it does nothing while running.
/// - `cancel` discards everything measured so far.
///
/// Elapsed times always come from `Instant`, never from the loop's
/// `Clock`: a loop built with a `FixedClock` freezes report timestamps and
/// `wait` deadlines, while task and run durations stay real.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    phase: Phase,
    segment_start: Option<Instant>,
    accumulated: Duration,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.phase = Phase::Running;
        self.segment_start = Some(Instant::now());
        self.accumulated = Duration::ZERO;
    }

    pub fn stop(&mut self) {
        if let Some(started) = self.segment_start.take() {
            self.accumulated += started.elapsed();
        }
        if self.phase == Phase::Running {
            self.phase = Phase::Stopped;
        }
    }

    pub fn restart(&mut self) {
        if self.phase == Phase::Running {
            return;
        }
        self.phase = Phase::Running;
        self.segment_start = Some(Instant::now());
    }

    pub fn cancel(&mut self) {
        self.phase = Phase::Cancelled;
        self.segment_start = None;
        self.accumulated = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == Phase::Cancelled
    }

    /// Time measured so far, including the segment in progress.
    pub fn elapsed(&self) -> Duration {
        let running = self
            .segment_start
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.accumulated + running
    }

    /// Elapsed seconds with `precision` decimals, e.g. `"1.002s"`.
    pub fn elapsed_time(&self, precision: usize) -> String {
        format!("{:.*}s", precision, self.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn fresh_stopwatch_reads_zero() {
        let watch = Stopwatch::new();
        assert_eq!(watch.elapsed(), Duration::ZERO);
        assert_eq!(watch.elapsed_time(3), "0.000s");
        assert!(!watch.is_running());
    }

    #[test]
    fn stop_freezes_the_measurement() {
        let mut watch = Stopwatch::new();
        watch.start();
        sleep(Duration::from_millis(20));
        watch.stop();

        let frozen = watch.elapsed();
        sleep(Duration::from_millis(10));

        assert!(frozen >= Duration::from_millis(20));
        assert_eq!(watch.elapsed(), frozen);
    }

    #[test]
    fn restart_accumulates_after_a_pause() {
        let mut watch = Stopwatch::new();
        watch.start();
        sleep(Duration::from_millis(10));
        watch.stop();
        let first = watch.elapsed();

        watch.restart();
        sleep(Duration::from_millis(10));
        watch.stop();

        assert!(watch.elapsed() >= first + Duration::from_millis(10));
    }

    #[test]
    fn restart_while_running_keeps_the_segment() {
        let mut watch = Stopwatch::new();
        watch.start();
        sleep(Duration::from_millis(15));
        watch.restart();
        watch.stop();

        assert!(watch.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn cancel_discards_everything() {
        let mut watch = Stopwatch::new();
        watch.start();
        sleep(Duration::from_millis(5));
        watch.cancel();

        assert!(watch.is_cancelled());
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn precision_controls_decimals() {
        let watch = Stopwatch::new();
        assert_eq!(watch.elapsed_time(0), "0s");
        assert_eq!(watch.elapsed_time(6), "0.000000s");
    }
}
