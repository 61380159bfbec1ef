use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::FeedEvent;

pub type Callback = Arc<dyn Fn(FeedEvent) + Send + Sync>;

/// Tracks, per message type, which consumer callbacks are interested.
///
/// Entries are keyed by (message_type, consumer_id); registering the same
/// pair again replaces the previous callback, so a consumer never receives
/// an event twice. The registry lives independently of any connection and
/// survives reconnects.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<HashMap<String, HashMap<String, Callback>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, message_type: &str, consumer_id: &str, callback: Callback) {
        let mut inner = self.inner.write().await;
        inner
            .entry(message_type.to_string())
            .or_default()
            .insert(consumer_id.to_string(), callback);
    }

    pub async fn deregister(&self, message_type: &str, consumer_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(consumers) = inner.get_mut(message_type) {
            consumers.remove(consumer_id);
            if consumers.is_empty() {
                inner.remove(message_type);
            }
        }
    }

    /// Message types that currently have at least one consumer.
    pub async fn topics(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Snapshot of the consumers for one message type. Dispatch iterates
    /// over the copy so concurrent mount/unmount cannot invalidate it.
    pub async fn snapshot(&self, message_type: &str) -> Vec<(String, Callback)> {
        self.inner
            .read()
            .await
            .get(message_type)
            .map(|consumers| {
                consumers
                    .iter()
                    .map(|(id, cb)| (id.clone(), cb.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn consumer_count(&self, message_type: &str) -> usize {
        self.inner
            .read()
            .await
            .get(message_type)
            .map_or(0, HashMap::len)
    }
}
