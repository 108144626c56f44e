use std::time::Duration;

use tokio::time::Instant;

/// Window over which a transfer rate is averaged
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Cumulative byte counter with a windowed bytes-per-second rate.
#[derive(Debug, Clone, Copy)]
pub struct RateMeter {
    total: u64,
    rate: u64,
    window_start: Instant,
    window_bytes: u64,
    last_update: Instant,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateMeter {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            total: 0,
            rate: 0,
            window_start: now,
            window_bytes: 0,
            last_update: now,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Record a new cumulative total. Totals never go backwards.
    pub fn record_total(&mut self, total: u64) {
        let now = Instant::now();
        if total > self.total {
            self.window_bytes += total - self.total;
            self.total = total;
        }
        self.last_update = now;

        let elapsed = now.duration_since(self.window_start);
        if elapsed >= RATE_WINDOW {
            self.rate = (self.window_bytes as f64 / elapsed.as_secs_f64()) as u64;
            self.window_start = now;
            self.window_bytes = 0;
        }
    }

    pub fn add(&mut self, bytes: u64) {
        self.record_total(self.total.saturating_add(bytes));
    }

    /// Bytes per second, zero once updates stop arriving
    pub fn rate(&self) -> u64 {
        if self.last_update.elapsed() > RATE_WINDOW * 2 {
            0
        } else {
            self.rate
        }
    }
}
