//! Metrics sink abstraction
//!
//! Components report named timers and counters through [`MetricsSink`]. The
//! default [`MetricsFacade`] forwards to the `metrics` crate, so the embedding
//! process decides which exporter (if any) receives them.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Destination for named timers and counters
pub trait MetricsSink: Send + Sync {
    /// Record the time elapsed since `since` under `name`
    fn update_since(&self, name: &str, since: Instant);

    /// Increment the counter `name` by one
    fn mark(&self, name: &str);
}

/// Sink forwarding to the global `metrics` recorder
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsFacade;

impl MetricsSink for MetricsFacade {
    fn update_since(&self, name: &str, since: Instant) {
        metrics::histogram!(name.to_string()).record(since.elapsed().as_secs_f64());
    }

    fn mark(&self, name: &str) {
        metrics::counter!(name.to_string()).increment(1);
    }
}

/// Aggregated value of one in-memory metric
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricStat {
    /// Number of observations
    pub count: u64,
    /// Sum of recorded durations (zero for counters)
    pub total: Duration,
}

/// In-process sink keeping per-name aggregates
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    stats: DashMap<String, MetricStat>,
}

impl InMemoryMetrics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of observations recorded under `name`
    pub fn count(&self, name: &str) -> u64 {
        self.stats.get(name).map(|s| s.count).unwrap_or(0)
    }

    /// Aggregate recorded under `name`
    pub fn stat(&self, name: &str) -> Option<MetricStat> {
        self.stats.get(name).map(|s| *s)
    }

    /// All metric names seen so far, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stats.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn observe(&self, name: &str, elapsed: Duration) {
        let mut stat = self.stats.entry(name.to_string()).or_default();
        stat.count += 1;
        stat.total += elapsed;
    }
}

impl MetricsSink for InMemoryMetrics {
    fn update_since(&self, name: &str, since: Instant) {
        self.observe(name, since.elapsed());
    }

    fn mark(&self, name: &str) {
        self.observe(name, Duration::ZERO);
    }
}

/// Make a host or other free-form value safe to use as a metric name segment
pub fn clean(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '.' | ':' | '/' | ' ' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_metrics() {
        let metrics = InMemoryMetrics::new();
        metrics.mark("reqs.test");
        metrics.mark("reqs.test");
        metrics.update_since("reqs.timer", Instant::now());

        assert_eq!(metrics.count("reqs.test"), 2);
        assert_eq!(metrics.count("reqs.timer"), 1);
        assert_eq!(metrics.count("reqs.missing"), 0);
        assert_eq!(metrics.names(), vec!["reqs.test", "reqs.timer"]);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("s3-a.internal:9000"), "s3-a_internal_9000");
        assert_eq!(clean("plain"), "plain");
    }
}
