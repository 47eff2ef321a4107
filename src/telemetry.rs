//! Metrics tracking.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub messages_received: AtomicU64,
    pub messages_relevant: AtomicU64,
    pub messages_irrelevant: AtomicU64,
    pub blocked_rejections: AtomicU64,
    pub blocks_added: AtomicU64,
    pub unblocks: AtomicU64,
    pub rate_limited: AtomicU64,
    pub completions: AtomicU64,
    pub backend_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission(&self, relevant: bool) {
        let counter = if relevant { &self.messages_relevant } else { &self.messages_irrelevant };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_rejection(&self) {
        self.blocked_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self) {
        self.blocks_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unblock(&self) {
        self.unblocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_relevant: self.messages_relevant.load(Ordering::Relaxed),
            messages_irrelevant: self.messages_irrelevant.load(Ordering::Relaxed),
            blocked_rejections: self.blocked_rejections.load(Ordering::Relaxed),
            blocks_added: self.blocks_added.load(Ordering::Relaxed),
            unblocks: self.unblocks.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_relevant: u64,
    pub messages_irrelevant: u64,
    pub blocked_rejections: u64,
    pub blocks_added: u64,
    pub unblocks: u64,
    pub rate_limited: u64,
    pub completions: u64,
    pub backend_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_start_at_zero() {
        let s = Metrics::new().snapshot();
        assert_eq!(s.messages_received, 0);
        assert_eq!(s.blocks_added, 0);
        assert_eq!(s.backend_failures, 0);
    }

    #[test]
    fn admission_splits_by_relevance() {
        let m = Metrics::new();
        m.record_admission(true);
        m.record_admission(false);
        m.record_admission(false);
        let s = m.snapshot();
        assert_eq!(s.messages_relevant, 1);
        assert_eq!(s.messages_irrelevant, 2);
    }

    #[test]
    fn record_block_increments() {
        let m = Metrics::new();
        m.record_block();
        assert_eq!(m.snapshot().blocks_added, 1);
    }
}
