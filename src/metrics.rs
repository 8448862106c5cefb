use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime counters for the collector service.
///
/// Purpose:
/// - Track request volume
/// - Track subscription lifecycle (opened vs released)
/// - Track feed throughput and validation outcomes
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // HTTP
    pub requests: AtomicUsize,

    // Subscriptions
    pub subscriptions_opened: AtomicUsize,
    pub subscriptions_released: AtomicUsize,

    // Throughput
    pub messages_received: AtomicUsize,
    pub records_accepted: AtomicUsize,
    pub records_rejected: AtomicUsize,

    pub message_faults: AtomicUsize,
    pub collection_timeouts: AtomicUsize,
    pub feed_errors: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary used by the periodic reporter.
    pub fn summary(&self) -> String {
        format!(
            "req={} sub_open={} sub_released={} recv={} accepted={} rejected={} faults={} timeouts={} feed_err={}",
            self.requests.load(Ordering::Relaxed),
            self.subscriptions_opened.load(Ordering::Relaxed),
            self.subscriptions_released.load(Ordering::Relaxed),
            self.messages_received.load(Ordering::Relaxed),
            self.records_accepted.load(Ordering::Relaxed),
            self.records_rejected.load(Ordering::Relaxed),
            self.message_faults.load(Ordering::Relaxed),
            self.collection_timeouts.load(Ordering::Relaxed),
            self.feed_errors.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));

/// Shorthand for a relaxed `fetch_add(1)`.
pub fn incr(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}
