use std::time::{Duration, Instant};

/// Inbound throughput over a fixed wall-clock window.
///
/// A rate is only reported for windows that saw traffic; an idle window keeps
/// running until the next frame arrives.
pub struct ThroughputMeter {
    frame_count: u32,
    window_start: Instant,
    window: Duration,
    frame_bits: u64,
}

impl ThroughputMeter {
    pub fn new(start: Instant, window: Duration, frame_bytes: usize) -> Self {
        Self {
            frame_count: 0,
            window_start: start,
            window,
            frame_bits: frame_bytes as u64 * 8,
        }
    }

    pub fn on_frame_received(&mut self) {
        self.frame_count = self.frame_count.saturating_add(1);
    }

    /// Returns the rate in Kbps when a window with traffic has closed.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        if self.frame_count == 0 || now.saturating_duration_since(self.window_start) < self.window {
            return None;
        }
        let rate_kbps = (self.frame_count as f64 * self.frame_bits as f64) / 1000.0;
        self.frame_count = 0;
        self.window_start = now;
        Some(rate_kbps)
    }
}
