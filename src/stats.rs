//! Latency and throughput counters
//!
//! Lock-free accumulators shared between the thread that records and the
//! threads that read. Readers get no snapshot guarantee: count and total may
//! come from different increments, which is fine for averages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
}

impl LatencyStats {
    pub fn mean_ms(&self) -> f64 {
        self.mean_us / 1000.0
    }
}

#[derive(Debug)]
pub struct LatencyCounter {
    count: AtomicU64,
    total_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
}

impl LatencyCounter {
    pub fn new() -> Self {
        LatencyCounter {
            count: AtomicU64::new(0),
            total_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
        }
    }

    /// Record one sample
    pub fn record(&self, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.record_micros(micros);
    }

    /// Record time elapsed since `start`
    pub fn record_since(&self, start: Instant) -> Duration {
        let elapsed = start.elapsed();
        self.record(elapsed);
        elapsed
    }

    pub fn record_micros(&self, micros: u64) {
        self.total_us.fetch_add(micros, Ordering::Relaxed);
        self.min_us.fetch_min(micros, Ordering::Relaxed);
        self.max_us.fetch_max(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of samples recorded
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all samples in microseconds
    pub fn total_micros(&self) -> u64 {
        self.total_us.load(Ordering::Relaxed)
    }

    /// Mean sample in milliseconds, 0.0 when empty
    pub fn average_ms(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.total_micros() as f64 / count as f64 / 1000.0
    }

    pub fn snapshot(&self) -> Option<LatencyStats> {
        let count = self.count();
        if count == 0 {
            return None;
        }

        Some(LatencyStats {
            count,
            min_us: self.min_us.load(Ordering::Relaxed),
            max_us: self.max_us.load(Ordering::Relaxed),
            mean_us: self.total_micros() as f64 / count as f64,
        })
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.total_us.store(0, Ordering::Relaxed);
        self.min_us.store(u64::MAX, Ordering::Relaxed);
        self.max_us.store(0, Ordering::Relaxed);
    }
}

impl Default for LatencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Message rate over a reporting interval
#[derive(Debug, Clone, Copy)]
pub struct RateMeter {
    last_count: u64,
    last_at: Instant,
}

impl RateMeter {
    pub fn new() -> Self {
        RateMeter {
            last_count: 0,
            last_at: Instant::now(),
        }
    }

    /// Messages per second since the previous call
    pub fn sample(&mut self, total: u64) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_at).as_secs_f64();
        let delta = total.saturating_sub(self.last_count);

        self.last_count = total;
        self.last_at = now;

        if elapsed > 0.0 {
            delta as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}
