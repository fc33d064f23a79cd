//! Frame timing for the render loop.

use std::time::{Duration, Instant};

/// Deltas shorter than this are treated as "no measurement" when computing FPS.
const MIN_MEASURABLE_DELTA: f64 = 0.0001;

/// Measures per-frame delta time and derives an instantaneous frame rate.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    last_delta: Duration,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            last_delta: Duration::ZERO,
        }
    }

    /// Total time since the timer was created or last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Marks the start of a new frame and returns the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.last_delta = now - self.last_tick;
        self.last_tick = now;
        self.last_delta
    }

    /// Delta of the most recent [`tick`](Self::tick), in seconds.
    pub fn delta_secs(&self) -> f64 {
        self.last_delta.as_secs_f64()
    }

    /// Frame rate implied by the last delta, or zero if it was too short to measure.
    pub fn fps(&self) -> f64 {
        fps_from_delta(self.delta_secs())
    }

    /// Human readable "ms / fps" line for on-screen stats.
    pub fn stats_line(&self) -> String {
        let delta = self.delta_secs();
        if delta > MIN_MEASURABLE_DELTA {
            format!("ms: {:.2}, fps: {:.2}", delta * 1000.0, 1.0 / delta)
        } else {
            "ms: 0.00, fps: 0.00".to_string()
        }
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.last_delta = Duration::ZERO;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

fn fps_from_delta(delta: f64) -> f64 {
    if delta > MIN_MEASURABLE_DELTA {
        1.0 / delta
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_reports_zero_fps() {
        let timer = Timer::new();
        assert_eq!(timer.fps(), 0.0);
        assert_eq!(timer.stats_line(), "ms: 0.00, fps: 0.00");
    }

    #[test]
    fn fps_is_reciprocal_of_delta() {
        assert!((fps_from_delta(0.016) - 62.5).abs() < 1e-9);
        assert_eq!(fps_from_delta(0.00001), 0.0);
    }

    #[test]
    fn tick_records_delta() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let delta = timer.tick();
        assert!(delta >= Duration::from_millis(2));
        assert_eq!(timer.delta_secs(), delta.as_secs_f64());
    }
}
