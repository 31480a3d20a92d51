//! Lightweight counters tracking RPC traffic and reconciliation anomalies so
//! the client can expose aggregated snapshots without leaking implementation
//! details to downstream consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ClientMetrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_retries: AtomicU64,
    total_latency_ns: AtomicU64,
    dropped_blocks: AtomicU64,
    duplicate_blocks: AtomicU64,
    reconcile_passes: AtomicU64,
}

impl ClientMetrics {
    pub(crate) fn record_request(&self, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_block(&self) {
        self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate_block(&self) {
        self.duplicate_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconcile_pass(&self) {
        self.reconcile_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        let requests = self.total_requests.load(Ordering::Relaxed);
        let total_latency_ns = self.total_latency_ns.load(Ordering::Relaxed);

        let average_latency_ms = if requests == 0 {
            0.0
        } else {
            (total_latency_ns as f64 / requests as f64) / 1_000_000.0
        };

        ClientMetricsSnapshot {
            requests,
            errors: self.total_errors.load(Ordering::Relaxed),
            retries: self.total_retries.load(Ordering::Relaxed),
            average_latency_ms,
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
            duplicate_blocks: self.duplicate_blocks.load(Ordering::Relaxed),
            reconcile_passes: self.reconcile_passes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ClientMetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub retries: u64,
    pub average_latency_ms: f64,
    /// Blocks discarded because they carried no usable `block_id`.
    pub dropped_blocks: u64,
    pub duplicate_blocks: u64,
    pub reconcile_passes: u64,
}
