//! Observability metrics: search latency and note lifecycle throughput.

use std::collections::VecDeque;
use std::time::Duration;

use crate::service::SearchMode;

/// Number of most recent search latencies kept for averages and percentiles.
pub const LATENCY_WINDOW: usize = 4096;

/// Collects runtime metrics for the note service.
#[derive(Debug)]
pub struct MetricsCollector {
    /// The last `LATENCY_WINDOW` search latencies, oldest first.
    search_latencies_us: VecDeque<f64>,
    keyword_searches: u64,
    semantic_searches: u64,
    total_creates: u64,
    total_updates: u64,
    total_deletes: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            search_latencies_us: VecDeque::with_capacity(LATENCY_WINDOW),
            keyword_searches: 0,
            semantic_searches: 0,
            total_creates: 0,
            total_updates: 0,
            total_deletes: 0,
        }
    }

    /// Record a search with its duration.
    pub fn record_search(&mut self, mode: SearchMode, duration: Duration) {
        match mode {
            SearchMode::Keyword => self.keyword_searches += 1,
            SearchMode::Semantic => self.semantic_searches += 1,
        }
        if self.search_latencies_us.len() == LATENCY_WINDOW {
            self.search_latencies_us.pop_front();
        }
        self.search_latencies_us.push_back(duration.as_micros() as f64);
    }

    pub fn record_create(&mut self) {
        self.total_creates += 1;
    }

    pub fn record_update(&mut self) {
        self.total_updates += 1;
    }

    pub fn record_delete(&mut self) {
        self.total_deletes += 1;
    }

    pub fn total_searches(&self) -> u64 {
        self.keyword_searches + self.semantic_searches
    }

    pub fn keyword_searches(&self) -> u64 {
        self.keyword_searches
    }

    pub fn semantic_searches(&self) -> u64 {
        self.semantic_searches
    }

    pub fn total_creates(&self) -> u64 {
        self.total_creates
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn total_deletes(&self) -> u64 {
        self.total_deletes
    }

    /// Average latency in microseconds over the recent window.
    pub fn avg_search_latency_us(&self) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.search_latencies_us.iter().sum();
        sum / self.search_latencies_us.len() as f64
    }

    /// Get a percentile of search latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_search_latency_us(&self, percentile: f64) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.search_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
