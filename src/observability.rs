//! Request counters exposed on `/health`

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by all requests
#[derive(Debug, Default)]
pub struct Metrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    resized: AtomicU64,
    requests_failed: AtomicU64,
    cache_write_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        Self::bump(&self.cache_hits, "cache_hits");
    }

    pub fn cache_miss(&self) {
        Self::bump(&self.cache_misses, "cache_misses");
    }

    pub fn resized(&self) {
        Self::bump(&self.resized, "resized");
    }

    pub fn request_failed(&self) {
        Self::bump(&self.requests_failed, "requests_failed");
    }

    pub fn cache_write_failed(&self) {
        Self::bump(&self.cache_write_failures, "cache_write_failures");
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            resized: self.resized.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub resized: u64,
    pub requests_failed: u64,
    pub cache_write_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let metrics = Metrics::new();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_miss();
        metrics.cache_write_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.resized, 0);
        assert_eq!(snapshot.requests_failed, 0);
        assert_eq!(snapshot.cache_write_failures, 1);
    }
}
