//! Windowed hashrate measurement.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counts hashes and derives a rate over the window since the last read.
pub struct HashrateMeter {
    hashes: AtomicU64,
    window: Mutex<Window>,
}

struct Window {
    since: Instant,
    hashes_at_start: u64,
}

impl HashrateMeter {
    /// Create a meter with an empty window.
    pub fn new() -> Self {
        Self {
            hashes: AtomicU64::new(0),
            window: Mutex::new(Window {
                since: Instant::now(),
                hashes_at_start: 0,
            }),
        }
    }

    /// Record `count` tried nonces.
    pub fn record(&self, count: u64) {
        self.hashes.fetch_add(count, Ordering::Relaxed);
    }

    /// Hashes per second since the previous call; resets the window.
    pub fn rate(&self) -> f64 {
        let total = self.hashes.load(Ordering::Relaxed);
        let mut window = self.window.lock();
        let elapsed = window.since.elapsed().as_secs_f64();
        let in_window = total - window.hashes_at_start;
        window.since = Instant::now();
        window.hashes_at_start = total;
        if elapsed <= 0.0 {
            return 0.0;
        }
        in_window as f64 / elapsed
    }
}

impl Default for HashrateMeter {
    fn default() -> Self {
        Self::new()
    }
}
