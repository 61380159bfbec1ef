use std::sync::atomic::{AtomicU64, Ordering};

pub struct FeedMetrics {
    connections_opened: AtomicU64,
    reconnect_attempts: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    events_dispatched: AtomicU64,
    dispatch_panics: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            dispatch_panics: AtomicU64::new(0),
        }
    }

    pub fn record_connection(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_panic(&self) {
        self.dispatch_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedMetricsSnapshot {
        FeedMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            dispatch_panics: self.dispatch_panics.load(Ordering::Relaxed),
        }
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FeedMetricsSnapshot {
    pub connections_opened: u64,
    pub reconnect_attempts: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub events_dispatched: u64,
    pub dispatch_panics: u64,
}
