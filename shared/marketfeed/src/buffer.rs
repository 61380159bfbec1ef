use std::collections::VecDeque;
use tokio::sync::Mutex;

/// FIFO queue of serialized outbound frames awaiting a live connection.
///
/// The queue is unbounded and entries never expire: while the upstream
/// stays down, queued frames accumulate without limit, and callers get no
/// backpressure signal. Known limitation.
#[derive(Default)]
pub struct OutboundBuffer {
    frames: Mutex<VecDeque<String>>,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, frame: String) {
        self.frames.lock().await.push_back(frame);
    }

    /// Removes and returns every queued frame, oldest first.
    pub async fn drain(&self) -> Vec<String> {
        self.frames.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.frames.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.frames.lock().await.is_empty()
    }
}
