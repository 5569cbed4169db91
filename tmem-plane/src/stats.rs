//! # Plane Statistics
//!
//! A sibling read-only surface to the data path: per-command counters
//! (`puts`, `gets`, `invalidates`, `controls`, `generates`), per-backend
//! dispatch counts, and a bucketed latency histogram, all updated from
//! every command dispatch without holding the command lock any longer than
//! the dispatch itself already does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// Upper bound, in microseconds, of each latency bucket. A sample lands in
/// the first bucket whose bound it does not exceed; anything past the last
/// bound falls into an implicit overflow bucket.
pub const DEFAULT_LATENCY_BUCKETS_US: [u64; 12] =
    [1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000];

/// A fixed-bucket latency histogram backed by atomic counters, so recording
/// a sample never takes a lock.
pub struct LatencyHistogram {
    bounds_us: Vec<u64>,
    buckets: Vec<AtomicU64>,
    samples: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    pub fn new(bounds_us: Vec<u64>) -> Self {
        let buckets = (0..=bounds_us.len()).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram { bounds_us, buckets, samples: AtomicU64::new(0), sum_us: AtomicU64::new(0) }
    }

    pub fn record(&self, latency: Duration) {
        let micros = latency.as_micros().min(u128::from(u64::MAX)) as u64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);
        let idx = self.bounds_us.iter().position(|&bound| micros <= bound).unwrap_or(self.bounds_us.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.clone(),
            buckets: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        LatencyHistogram::new(DEFAULT_LATENCY_BUCKETS_US.to_vec())
    }
}

/// A point-in-time read of a [`LatencyHistogram`].
#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    pub bounds_us: Vec<u64>,
    pub buckets: Vec<u64>,
    pub samples: u64,
    pub sum_us: u64,
}

impl LatencySnapshot {
    /// Mean latency in microseconds, or `0` if no samples were recorded.
    pub fn mean_us(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.sum_us / self.samples
        }
    }
}

/// The request plane's observable counters, a sibling surface to the data
/// path rather than part of it.
pub struct PlaneStats {
    puts: AtomicU64,
    gets: AtomicU64,
    invalidates: AtomicU64,
    controls: AtomicU64,
    generates: AtomicU64,
    dispatch_counts: Mutex<HashMap<&'static str, u64>>,
    latency: LatencyHistogram,
}

impl PlaneStats {
    pub fn new() -> Self {
        PlaneStats {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            invalidates: AtomicU64::new(0),
            controls: AtomicU64::new(0),
            generates: AtomicU64::new(0),
            dispatch_counts: Mutex::new(HashMap::new()),
            latency: LatencyHistogram::default(),
        }
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidate(&self) {
        self.invalidates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control(&self) {
        self.controls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generate(&self) {
        self.generates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a backend dispatch's latency and bumps that backend's
    /// dispatch count.
    pub fn record_backend_dispatch(&self, backend_name: &'static str, latency: Duration) {
        self.latency.record(latency);
        *self.dispatch_counts.lock().entry(backend_name).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> PlaneStatsSnapshot {
        let dispatch_counts = self.dispatch_counts.lock().iter().map(|(k, v)| (*k, *v)).collect();
        PlaneStatsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            invalidates: self.invalidates.load(Ordering::Relaxed),
            controls: self.controls.load(Ordering::Relaxed),
            generates: self.generates.load(Ordering::Relaxed),
            dispatch_counts,
            latency: self.latency.snapshot(),
        }
    }
}

impl Default for PlaneStats {
    fn default() -> Self {
        PlaneStats::new()
    }
}

/// A point-in-time read of [`PlaneStats`].
#[derive(Debug, Clone)]
pub struct PlaneStatsSnapshot {
    pub puts: u64,
    pub gets: u64,
    pub invalidates: u64,
    pub controls: u64,
    pub generates: u64,
    pub dispatch_counts: Vec<(&'static str, u64)>,
    pub latency: LatencySnapshot,
}
