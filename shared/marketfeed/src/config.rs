use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Fixed delay between reconnect attempts. The upstream expects a flat
    /// cadence, not exponential backoff.
    pub reconnect_interval: Duration,
    /// Consecutive failed attempts allowed before the client parks and waits
    /// for an explicit force-reconnect.
    pub max_reconnect_attempts: usize,
    /// Cadence of the transport liveness check. The upstream does not
    /// acknowledge protocol pings, so the check inspects connection state
    /// and forces a reconnect instead.
    pub liveness_interval: Duration,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            liveness_interval: Duration::from_secs(30),
        }
    }
}
