use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed client is shut down")]
    Shutdown,

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
