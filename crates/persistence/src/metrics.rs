//! Store metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single store worker
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Batches appended successfully
    batch_count: AtomicU64,
    /// Samples appended successfully
    sample_count: AtomicU64,
    /// Failed appends
    failure_count: AtomicU64,
    /// Batches dropped due to full queue
    dropped_count: AtomicU64,
}

impl StoreMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Relaxed)
    }

    /// Record one successful append of `samples` rows
    pub fn record_batch(&self, samples: usize) {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        self.sample_count.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batch_count: self.batch_count(),
            sample_count: self.sample_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Point-in-time snapshot of store metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batch_count: u64,
    pub sample_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}
