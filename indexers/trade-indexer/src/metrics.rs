use std::sync::atomic::{AtomicU64, Ordering};

pub struct IndexerMetrics {
    signatures_resolved: AtomicU64,
    transactions_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    trades_classified: AtomicU64,
}

impl IndexerMetrics {
    pub fn new() -> Self {
        Self {
            signatures_resolved: AtomicU64::new(0),
            transactions_fetched: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            trades_classified: AtomicU64::new(0),
        }
    }

    pub fn record_signatures(&self, count: usize) {
        self.signatures_resolved
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_fetched(&self) {
        self.transactions_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trades(&self, count: usize) {
        self.trades_classified
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IndexerMetricsSnapshot {
        IndexerMetricsSnapshot {
            signatures_resolved: self.signatures_resolved.load(Ordering::Relaxed),
            transactions_fetched: self.transactions_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            trades_classified: self.trades_classified.load(Ordering::Relaxed),
        }
    }
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct IndexerMetricsSnapshot {
    pub signatures_resolved: u64,
    pub transactions_fetched: u64,
    pub fetch_failures: u64,
    pub trades_classified: u64,
}
