//! Metrics registry for aeroquery
//!
//! - Counters only, monotonic, reset on process start
//! - Atomic with Relaxed ordering; values are exact per counter

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Routing and compilation counters shared across concurrent queries
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_planned: AtomicU64,
    simple_reads: AtomicU64,
    pipeline_reads: AtomicU64,
    joins_staged: AtomicU64,
    joins_deduplicated: AtomicU64,
    queries_rejected: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_planned(&self) {
        self.queries_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_simple_reads(&self) {
        self.simple_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pipeline_reads(&self) {
        self.pipeline_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds the lookup stages of one compiled pipeline
    pub fn add_joins_staged(&self, count: u64) {
        self.joins_staged.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds the lookup requests that collapsed onto existing stages
    pub fn add_joins_deduplicated(&self, count: u64) {
        self.joins_deduplicated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_planned: self.queries_planned.load(Ordering::Relaxed),
            simple_reads: self.simple_reads.load(Ordering::Relaxed),
            pipeline_reads: self.pipeline_reads.load(Ordering::Relaxed),
            joins_staged: self.joins_staged.load(Ordering::Relaxed),
            joins_deduplicated: self.joins_deduplicated.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
        }
    }

    /// Current snapshot as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_planned: u64,
    pub simple_reads: u64,
    pub pipeline_reads: u64,
    pub joins_staged: u64,
    pub joins_deduplicated: u64,
    pub queries_rejected: u64,
}
