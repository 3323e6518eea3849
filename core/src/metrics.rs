use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Default)]
struct MetricsInner {
    total_searches: u64,
    cache_hits: u64,
    latency_total: Duration,
    last_latency: Duration,
    result_count_total: u64,
    result_counts: BTreeMap<usize, u64>,
}

/// Serving-path counters. Shared by every request thread; the mutex keeps
/// increments from racing. Cache hits count as searches too.
#[derive(Default)]
pub struct SearchMetrics {
    inner: Mutex<MetricsInner>,
}

/// Snapshot exposed on the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_searches: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub average_latency_ms: f64,
    pub last_latency_ms: f64,
    pub average_result_count: f64,
    /// How many searches returned each result count.
    pub result_count_distribution: BTreeMap<usize, u64>,
}

impl SearchMetrics {
    pub fn record_search(&self, latency: Duration, result_count: usize) {
        let mut inner = self.inner.lock();
        inner.total_searches += 1;
        inner.latency_total += latency;
        inner.last_latency = latency;
        inner.result_count_total += result_count as u64;
        *inner.result_counts.entry(result_count).or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self) {
        self.inner.lock().cache_hits += 1;
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock();
        let total = inner.total_searches;
        let divisor = total.max(1) as f64;
        Stats {
            total_searches: total,
            cache_hits: inner.cache_hits,
            cache_hit_rate: inner.cache_hits as f64 / divisor,
            average_latency_ms: inner.latency_total.as_secs_f64() * 1000.0 / divisor,
            last_latency_ms: inner.last_latency.as_secs_f64() * 1000.0,
            average_result_count: inner.result_count_total as f64 / divisor,
            result_count_distribution: inner.result_counts.clone(),
        }
    }
}
