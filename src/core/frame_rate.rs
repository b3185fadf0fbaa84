// Rolling frame-rate meter for the control loop

use std::collections::VecDeque;
use std::time::Duration;

/// Number of ticks averaged by default
pub const DEFAULT_WINDOW: usize = 30;

pub struct FrameRateMeter {
    samples: VecDeque<Duration>,
    window: usize,
    total: Duration,
}

impl FrameRateMeter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            total: Duration::ZERO,
        }
    }

    /// Record the wall time of one tick
    pub fn record(&mut self, tick: Duration) {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(tick);
        self.total += tick;
    }

    /// Ticks per second over the window; 0 before the first sample
    pub fn fps(&self) -> f32 {
        let secs = self.total.as_secs_f32();
        if self.samples.is_empty() || secs <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f32 / secs
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_meter_reports_zero() {
        let meter = FrameRateMeter::default();
        assert_eq!(meter.fps(), 0.0);
    }

    #[test]
    fn test_fps_from_constant_ticks() {
        let mut meter = FrameRateMeter::new(10);
        for _ in 0..10 {
            meter.record(Duration::from_millis(50));
        }
        assert!((meter.fps() - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_window_drops_old_samples() {
        let mut meter = FrameRateMeter::new(4);
        for _ in 0..4 {
            meter.record(Duration::from_millis(500));
        }
        for _ in 0..4 {
            meter.record(Duration::from_millis(100));
        }
        assert_eq!(meter.sample_count(), 4);
        assert!((meter.fps() - 10.0).abs() < 0.01);
    }
}
